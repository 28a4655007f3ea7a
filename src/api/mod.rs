pub mod client;
pub mod error;
pub mod okx;
pub mod rate_limiter;
pub mod secure_storage;

pub use client::{CredentialProvider, HttpMethod, RateLimitConfig, SignedTransport, TransportFactory};
pub use error::ApiError;
pub use rate_limiter::RateLimiter;
pub use secure_storage::SecureStorage;
