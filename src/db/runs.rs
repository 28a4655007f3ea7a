use chrono::Utc;
use rusqlite::{params, Result};
use uuid::Uuid;

use super::Database;
use crate::billing::{BillingError, RunOutcome};
use crate::models::{BillingRunSummary, RunStatus, SkippedAccount};
use crate::output::ReportSink;

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

impl Database {
    /// Store the run, its rows, and stamp billed accounts; returns the run id
    pub fn record_run(&self, outcome: &RunOutcome) -> Result<String> {
        let report = &outcome.report;
        let run_id = Uuid::new_v4().to_string();
        let run_timestamp = outcome.as_of.timestamp_millis();

        let all_complete = report.accounts.iter().all(|a| a.summary.complete);
        let status = if all_complete && report.skipped_accounts.is_empty() {
            RunStatus::Complete
        } else {
            RunStatus::Partial
        };

        let (window_start, window_end) = report
            .accounts
            .first()
            .map(|a| (a.trading.window_start, a.trading.window_end))
            .unwrap_or((run_timestamp, run_timestamp));

        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO billing_runs
                (id, report_name, run_timestamp, window_start, window_end, status,
                 total_accounts, skipped_accounts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &run_id,
                &report.report_name,
                run_timestamp,
                window_start,
                window_end,
                status.as_str(),
                report.total_accounts as i64,
                to_json(&report.skipped_accounts)?,
                Utc::now().timestamp(),
            ],
        )?;

        for (position, (snapshot, record)) in report.accounts.iter().zip(&outcome.records).enumerate() {
            tx.execute(
                "INSERT INTO billing_records (run_id, account_id, position, record_json, complete)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &run_id,
                    &snapshot.user.id,
                    position as i64,
                    to_json(record)?,
                    snapshot.summary.complete as i32,
                ],
            )?;

            tx.execute(
                "UPDATE accounts SET last_billed_timestamp = ?1 WHERE id = ?2",
                params![run_timestamp, &snapshot.user.id],
            )?;
        }

        tx.commit()?;
        Ok(run_id)
    }

    /// Most recent runs first
    pub fn list_runs(&self, limit: usize) -> Result<Vec<BillingRunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, report_name, run_timestamp, window_start, window_end, status,
                    total_accounts, skipped_accounts
             FROM billing_runs
             ORDER BY run_timestamp DESC, created_at DESC
             LIMIT ?1",
        )?;

        let runs = stmt
            .query_map([limit as i64], |row| {
                let skipped: String = row.get(7)?;
                let skipped_accounts: Vec<SkippedAccount> = serde_json::from_str(&skipped)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
                    })?;

                let status: String = row.get(5)?;
                let status = status.parse::<RunStatus>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        e.into(),
                    )
                })?;

                Ok(BillingRunSummary {
                    id: row.get(0)?,
                    report_name: row.get(1)?,
                    run_timestamp: row.get(2)?,
                    window_start: row.get(3)?,
                    window_end: row.get(4)?,
                    status,
                    total_accounts: row.get::<_, i64>(6)? as usize,
                    skipped_accounts,
                })
            })?
            .collect();
        runs
    }
}

/// Persists finished runs into the billing history tables
pub struct DatabaseSink<'a> {
    db: &'a Database,
}

impl<'a> DatabaseSink<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }
}

impl ReportSink for DatabaseSink<'_> {
    fn name(&self) -> &str {
        "database"
    }

    fn publish(&self, outcome: &RunOutcome) -> Result<(), BillingError> {
        let run_id = self.db.record_run(outcome)?;
        log::info!("Recorded billing run {}", run_id);
        Ok(())
    }
}
