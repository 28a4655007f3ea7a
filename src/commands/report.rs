use chrono::{DateTime, Utc};
use std::fs;
use std::sync::Arc;

use crate::api::okx::OkxConnector;
use crate::api::{CredentialProvider, SecureStorage, TransportFactory};
use crate::billing::{BillingError, BillingRun, RunOutcome};
use crate::db::{Database, DatabaseSink};
use crate::models::{BillingRunSummary, BillingSettings};
use crate::output::{publish_all, FileSink, ReportSink};

/// Open the credential store, creating its directory on first use
pub fn open_storage(settings: &BillingSettings) -> Result<SecureStorage, BillingError> {
    fs::create_dir_all(&settings.credential_store_dir)?;
    Ok(SecureStorage::new(&settings.credential_store_dir)?)
}

/// Bill all active accounts and publish the result to files and the database
pub async fn generate_report(
    settings: &BillingSettings,
    db: &Database,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn TransportFactory>,
    as_of: DateTime<Utc>,
) -> Result<RunOutcome, BillingError> {
    let accounts = db.active_accounts()?;
    if accounts.is_empty() {
        log::error!("No active accounts registered");
        return Err(BillingError::NoCredentials);
    }

    let run = BillingRun::new(settings.clone(), credentials, connector)?;
    let outcome = run.run(&accounts, as_of).await?;

    let files = FileSink::new(&settings.output_dir);
    let history = DatabaseSink::new(db);
    let sinks: [&dyn ReportSink; 2] = [&files, &history];
    publish_all(&sinks, &outcome)?;

    Ok(outcome)
}

/// Production wiring: encrypted store plus the OKX connector
pub async fn generate_okx_report(settings: &BillingSettings, db: &Database) -> Result<RunOutcome, BillingError> {
    let storage = open_storage(settings)?;
    let connector = OkxConnector::new(
        settings.base_url.clone(),
        (&settings.rate_limit).into(),
        settings.simulated,
    );

    generate_report(settings, db, Arc::new(storage), Arc::new(connector), Utc::now()).await
}

pub fn run_history(db: &Database, limit: usize) -> Result<Vec<BillingRunSummary>, BillingError> {
    Ok(db.list_runs(limit)?)
}
