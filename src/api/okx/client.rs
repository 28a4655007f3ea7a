use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;

use crate::api::{
    client::{HttpMethod, RateLimitConfig, SignedTransport, TransportFactory},
    error::ApiError,
    rate_limiter::RateLimiter,
};
use crate::models::Credentials;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BASE_URL: &str = "https://www.okx.com";

/// Signed REST client for one OKX account
pub struct OkxClient {
    credentials: Credentials,
    base_url: String,
    simulated: bool,
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl OkxClient {
    pub fn new(
        credentials: Credentials,
        base_url: impl Into<String>,
        http_client: reqwest::Client,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            simulated: false,
            http_client,
            rate_limiter: RateLimiter::new(rate_limit),
        }
    }

    /// Route requests to the demo-trading environment
    pub fn with_simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    /// Generate HMAC-SHA256 signature for OKX API
    fn generate_signature(
        &self,
        timestamp: &str,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<String, ApiError> {
        // Prehash string: timestamp + method + requestPath + body
        let prehash = format!("{}{}{}{}", timestamp, method, request_path, body);

        let mut mac = HmacSha256::new_from_slice(self.credentials.secret_key.as_bytes())
            .map_err(|e| ApiError::AuthenticationError(format!("Invalid secret key: {}", e)))?;
        mac.update(prehash.as_bytes());

        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Build authenticated headers for OKX API
    fn build_headers(&self, timestamp: &str, signature: &str) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("OK-ACCESS-KEY", HeaderValue::from_str(&self.credentials.api_key)?);
        headers.insert("OK-ACCESS-SIGN", HeaderValue::from_str(signature)?);
        headers.insert("OK-ACCESS-TIMESTAMP", HeaderValue::from_str(timestamp)?);
        headers.insert(
            "OK-ACCESS-PASSPHRASE",
            HeaderValue::from_str(&self.credentials.passphrase)?,
        );
        if self.simulated {
            headers.insert("x-simulated-trading", HeaderValue::from_static("1"));
        }

        Ok(headers)
    }
}

#[async_trait]
impl SignedTransport for OkxClient {
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.rate_limiter.acquire().await;

        // ISO 8601 with milliseconds, e.g. 2024-01-01T00:00:00.000Z
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let body = body.unwrap_or("");
        let signature = self.generate_signature(&timestamp, method.as_str(), path, body)?;
        let headers = self.build_headers(&timestamp, &signature)?;

        let url = format!("{}{}", self.base_url, path);
        log::debug!("{} {}", method, path);

        let request = match method {
            HttpMethod::Get => self.http_client.get(&url),
        };
        let response = request.headers(headers).send().await?;

        let status = response.status();
        let response_text = response.text().await?;
        map_response(status, path, &response_text)
    }
}

/// Map an HTTP status and body to the JSON envelope or a typed error
fn map_response(status: StatusCode, path: &str, body: &str) -> Result<Value, ApiError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::RateLimitError(format!("HTTP 429 on {}", path)));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::AuthenticationError(
            "Invalid API credentials or permissions".to_string(),
        ));
    }

    if !status.is_success() {
        // OKX reports most failures in the JSON envelope, even on 4xx
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            if value.get("code").is_some() {
                return Ok(value);
            }
        }
        return Err(ApiError::HttpStatus {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    serde_json::from_str(body)
        .map_err(|e| ApiError::ParseError(format!("Failed to parse response: {} - Body: {}", e, body)))
}

/// Builds one `OkxClient` per account, sharing the HTTP connection pool
pub struct OkxConnector {
    base_url: String,
    simulated: bool,
    rate_limit: RateLimitConfig,
    http_client: reqwest::Client,
}

impl OkxConnector {
    pub fn new(base_url: impl Into<String>, rate_limit: RateLimitConfig, simulated: bool) -> Self {
        Self {
            base_url: base_url.into(),
            simulated,
            rate_limit,
            http_client: reqwest::Client::new(),
        }
    }
}

impl TransportFactory for OkxConnector {
    fn exchange_name(&self) -> &str {
        "okx"
    }

    fn connect(&self, credentials: Credentials) -> Arc<dyn SignedTransport> {
        let client = OkxClient::new(
            credentials,
            self.base_url.clone(),
            self.http_client.clone(),
            self.rate_limit.clone(),
        )
        .with_simulated(self.simulated);

        Arc::new(client)
    }
}
