pub mod csv;
pub mod file;

pub use file::FileSink;

use crate::billing::{BillingError, RunOutcome};

/// Destination for a finished billing run
pub trait ReportSink {
    fn name(&self) -> &str;

    fn publish(&self, outcome: &RunOutcome) -> Result<(), BillingError>;
}

/// Publish to every sink; stops at the first failure
pub fn publish_all(sinks: &[&dyn ReportSink], outcome: &RunOutcome) -> Result<(), BillingError> {
    for sink in sinks {
        sink.publish(outcome)?;
        log::info!("Report published to {}", sink.name());
    }
    Ok(())
}
