use serde::{Deserialize, Serialize};
use std::fmt;

/// Account labeling carried through the pipeline untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub label: String,
}

/// API key triple for one account
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl Credentials {
    /// All three parts must be present for a usable credential
    pub fn is_usable(&self) -> bool {
        !self.api_key.trim().is_empty()
            && !self.secret_key.trim().is_empty()
            && !self.passphrase.trim().is_empty()
    }
}

// Keep secrets out of debug output and logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &AccountCredential::create_preview(&self.api_key))
            .field("secret_key", &"***")
            .field("passphrase", &"***")
            .finish()
    }
}

/// Registered account row (identity plus registry metadata)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCredential {
    pub identity: AccountIdentity,
    pub exchange: String,
    pub api_key_preview: String,
    pub is_active: bool,
    pub last_billed_timestamp: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AccountCredential {
    /// Create API key preview (last 4 characters)
    pub fn create_preview(api_key: &str) -> String {
        let chars: Vec<char> = api_key.chars().collect();
        let len = chars.len();
        if len <= 4 {
            "*".repeat(len)
        } else {
            let tail: String = chars[len - 4..].iter().collect();
            format!("{}...{}", "*".repeat(4), tail)
        }
    }
}

/// Input for registering or updating an account
#[derive(Debug, Clone)]
pub struct AccountInput {
    pub identity: AccountIdentity,
    pub exchange: String,
    pub credentials: Credentials,
    pub is_active: Option<bool>,
}
