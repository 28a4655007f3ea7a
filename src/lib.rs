pub mod api;
pub mod billing;
pub mod commands;
pub mod db;
pub mod models;
pub mod output;
