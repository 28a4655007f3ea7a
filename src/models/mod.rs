pub mod account;
pub mod billing;
pub mod ledger;
pub mod settings;

pub use account::*;
pub use billing::*;
pub use ledger::*;
pub use settings::*;
