use thiserror::Error;

/// Failures of the signed transport and the stores behind it
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Invalid API response: {0}")]
    ParseError(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Envelope `code` other than "0"
    #[error("Exchange API error: {code} - {message}")]
    ExchangeError { code: String, message: String },

    #[error("Invalid credentials for account {0}")]
    InvalidCredentials(String),
}

impl ApiError {
    /// Exchange-level error code, if the exchange answered with one
    pub fn exchange_code(&self) -> Option<&str> {
        match self {
            ApiError::ExchangeError { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}

impl From<aes_gcm::Error> for ApiError {
    fn from(err: aes_gcm::Error) -> Self {
        ApiError::EncryptionError(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for ApiError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        ApiError::AuthenticationError(format!("Invalid header value: {}", err))
    }
}
