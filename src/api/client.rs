use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::error::ApiError;
use crate::models::Credentials;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated request channel bound to one account's credentials.
///
/// Implementations own signing, headers and rate limiting; callers only see
/// the parsed JSON body. `path` includes the query string.
#[async_trait]
pub trait SignedTransport: Send + Sync {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
    ) -> Result<Value, ApiError>;
}

/// Creates a transport per account
pub trait TransportFactory: Send + Sync {
    fn exchange_name(&self) -> &str;

    fn connect(&self, credentials: Credentials) -> Arc<dyn SignedTransport>;
}

/// Source of per-account API keys.
///
/// `Ok(None)` means the account has no usable credential; errors are
/// reserved for a store that cannot be read at all.
pub trait CredentialProvider: Send + Sync {
    fn credentials_for(&self, account_id: &str) -> Result<Option<Credentials>, ApiError>;
}

/// Build a query string in insertion order, skipping absent values
pub fn build_query(params: &[(&str, Option<&str>)]) -> String {
    let pairs: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, v)))
        .collect();

    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}
