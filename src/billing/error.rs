use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum BillingError {
    /// Account has no usable key triple; it is skipped
    #[error("No usable credentials for account {account_id}")]
    MissingCredentials { account_id: String },

    /// No account anywhere could be billed
    #[error("No account has usable credentials")]
    NoCredentials,

    #[error("Fetching bills for {instrument} failed: {source}")]
    Fetch {
        instrument: String,
        #[source]
        source: ApiError,
    },

    #[error("Pagination for {instrument} stopped: {reason}")]
    Pagination { instrument: String, reason: String },

    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(#[source] ApiError),

    #[error("Positions unavailable: {0}")]
    PositionsUnavailable(#[source] ApiError),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
