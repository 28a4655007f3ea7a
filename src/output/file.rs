use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::csv::write_csv;
use super::ReportSink;
use crate::billing::{BillingError, RunOutcome};

/// Writes `{report_name}_{YYYYMMDD_HHMMSS}.json` and `.csv` into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn file_stem(outcome: &RunOutcome) -> String {
        format!(
            "{}_{}",
            outcome.report.report_name,
            outcome.as_of.format("%Y%m%d_%H%M%S")
        )
    }

    /// Returns the JSON and CSV paths written
    pub fn write(&self, outcome: &RunOutcome) -> Result<(PathBuf, PathBuf), BillingError> {
        fs::create_dir_all(&self.output_dir)?;

        let stem = Self::file_stem(outcome);
        let json_path = self.output_dir.join(format!("{}.json", stem));
        let csv_path = self.output_dir.join(format!("{}.csv", stem));

        let mut json_file = BufWriter::new(File::create(&json_path)?);
        serde_json::to_writer_pretty(&mut json_file, &outcome.report)?;
        json_file.flush()?;

        write_csv(BufWriter::new(File::create(&csv_path)?), &outcome.records)?;

        Ok((json_path, csv_path))
    }
}

impl ReportSink for FileSink {
    fn name(&self) -> &str {
        "files"
    }

    fn publish(&self, outcome: &RunOutcome) -> Result<(), BillingError> {
        let (json_path, csv_path) = self.write(outcome)?;
        log::info!("Wrote {} and {}", json_path.display(), csv_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::csv::read_report;
    use crate::models::Report;
    use chrono::{TimeZone, Utc};

    fn outcome() -> RunOutcome {
        RunOutcome {
            report: Report {
                timestamp: "2024-03-05T07:08:09+00:00".to_string(),
                report_name: "march".to_string(),
                total_accounts: 0,
                skipped_accounts: vec![],
                accounts: vec![],
            },
            records: vec![],
            as_of: Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap(),
        }
    }

    #[test]
    fn test_writes_both_artifacts_with_timestamped_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("nested"));

        let (json_path, csv_path) = sink.write(&outcome()).unwrap();

        assert_eq!(json_path.file_name().unwrap(), "march_20240305_070809.json");
        assert_eq!(csv_path.file_name().unwrap(), "march_20240305_070809.csv");
        assert_eq!(read_report(&json_path).unwrap(), outcome().report);

        let csv_text = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv_text.lines().count(), 1);
    }
}
