use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use crate::billing::formatter;
use crate::billing::BillingError;
use crate::models::{BillingRecord, Report, BILLING_COLUMNS};

/// Write the header and one row per record
pub fn write_csv<W: Write>(writer: W, records: &[BillingRecord]) -> Result<(), BillingError> {
    let mut csv_writer = ::csv::WriterBuilder::new().from_writer(writer);

    csv_writer.write_record(BILLING_COLUMNS)?;
    for record in records {
        csv_writer.write_record(record.values())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Re-derive the billing rows of a stored JSON report
pub fn records_from_report(report: &Report, timezone: &str) -> Result<Vec<BillingRecord>, BillingError> {
    let as_of: DateTime<Utc> = DateTime::parse_from_rfc3339(&report.timestamp)
        .map_err(|e| BillingError::Config(format!("report timestamp '{}': {}", report.timestamp, e)))?
        .with_timezone(&Utc);

    report
        .accounts
        .iter()
        .map(|snapshot| formatter::format(snapshot, as_of, timezone))
        .collect()
}

pub fn read_report(path: &Path) -> Result<Report, BillingError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// JSON report at `input` to CSV at `output`; returns the row count
pub fn convert(input: &Path, output: &Path, timezone: &str) -> Result<usize, BillingError> {
    let report = read_report(input)?;
    let records = records_from_report(&report, timezone)?;
    write_csv(File::create(output)?, &records)?;

    log::info!(
        "Converted {} account(s) from {} to {}",
        records.len(),
        input.display(),
        output.display()
    );
    Ok(records.len())
}
