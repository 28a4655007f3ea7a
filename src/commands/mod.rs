pub mod accounts;
pub mod report;

pub use accounts::*;
pub use report::*;
