pub mod accounts;
pub mod connection;
pub mod migration_runner;
pub mod runs;

pub use connection::Database;
pub use runs::DatabaseSink;
