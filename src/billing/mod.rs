pub mod aggregator;
pub mod error;
pub mod fees;
pub mod fetcher;
pub mod formatter;
pub mod pipeline;
pub mod snapshot;

#[cfg(test)]
pub mod testing;

pub use error::BillingError;
pub use fees::FeeCalculator;
pub use fetcher::BillFetcher;
pub use pipeline::{BillingRun, RunOutcome};
pub use snapshot::AccountSnapshotBuilder;
