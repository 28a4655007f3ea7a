use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::password_hash::rand_core::RngCore;
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::client::CredentialProvider;
use super::error::ApiError;
use crate::models::Credentials;

const ENCRYPTION_VERSION: u8 = 1;
const STORE_FILE: &str = "credentials.enc";

#[derive(Serialize, Deserialize, Clone)]
struct EncryptedSecret {
    nonce: String,      // Base64 encoded nonce
    ciphertext: String, // Base64 encoded encrypted data
}

#[derive(Serialize, Deserialize)]
struct SecretFile {
    version: u8,
    salt: String, // Base64 encoded salt for key derivation
    secrets: BTreeMap<String, EncryptedSecret>,
}

/// AES-256-GCM encrypted credential file.
///
/// The key is derived with Argon2id from a machine identifier and a salt
/// persisted next to the secrets, so the file only opens on the host that
/// wrote it.
pub struct SecureStorage {
    store_path: PathBuf,
    master_key: Vec<u8>,
}

impl SecureStorage {
    pub fn new(dir: &Path) -> Result<Self, ApiError> {
        let store_path = dir.join(STORE_FILE);
        let file = Self::load_or_create(&store_path)?;
        let master_key = Self::derive_key(&Self::machine_id(), &file.salt)?;

        let storage = Self {
            store_path,
            master_key,
        };
        // Persist the fresh salt before anything is encrypted with it
        if !storage.store_path.exists() {
            storage.save(&file)?;
        }
        Ok(storage)
    }

    fn load_or_create(store_path: &Path) -> Result<SecretFile, ApiError> {
        if store_path.exists() {
            let data = fs::read(store_path)
                .map_err(|e| ApiError::EncryptionError(format!("Failed to read store: {}", e)))?;

            let file: SecretFile = serde_json::from_slice(&data)
                .map_err(|e| ApiError::EncryptionError(format!("Failed to parse store: {}", e)))?;
            if file.version != ENCRYPTION_VERSION {
                return Err(ApiError::EncryptionError(format!(
                    "Unsupported store version {}",
                    file.version
                )));
            }
            Ok(file)
        } else {
            let mut salt_bytes = [0u8; 16];
            OsRng.fill_bytes(&mut salt_bytes);

            Ok(SecretFile {
                version: ENCRYPTION_VERSION,
                salt: BASE64.encode(salt_bytes),
                secrets: BTreeMap::new(),
            })
        }
    }

    fn machine_id() -> String {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());

        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown-user".to_string());

        format!("pnl-billing-{}-{}", hostname, username)
    }

    fn derive_key(machine_id: &str, salt_b64: &str) -> Result<Vec<u8>, ApiError> {
        let salt = BASE64
            .decode(salt_b64)
            .map_err(|e| ApiError::EncryptionError(format!("Invalid salt: {}", e)))?;

        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(machine_id.as_bytes(), &salt, &mut key)
            .map_err(|e| ApiError::EncryptionError(format!("Key derivation failed: {}", e)))?;

        Ok(key.to_vec())
    }

    fn cipher(&self) -> Result<Aes256Gcm, ApiError> {
        Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| ApiError::EncryptionError(format!("Failed to create cipher: {}", e)))
    }

    fn save(&self, file: &SecretFile) -> Result<(), ApiError> {
        let data = serde_json::to_vec_pretty(file)
            .map_err(|e| ApiError::EncryptionError(format!("Failed to serialize store: {}", e)))?;

        if let Some(parent) = self.store_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ApiError::EncryptionError(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(&self.store_path, data)
            .map_err(|e| ApiError::EncryptionError(format!("Failed to write store: {}", e)))
    }

    /// Encrypt and store one secret
    pub fn store(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), value.as_bytes())?;

        let mut file = Self::load_or_create(&self.store_path)?;
        file.secrets.insert(
            key.to_string(),
            EncryptedSecret {
                nonce: BASE64.encode(nonce_bytes),
                ciphertext: BASE64.encode(&ciphertext),
            },
        );

        self.save(&file)
    }

    /// Decrypt one secret; `Ok(None)` if it was never stored
    pub fn retrieve(&self, key: &str) -> Result<Option<String>, ApiError> {
        let file = Self::load_or_create(&self.store_path)?;
        let Some(encrypted) = file.secrets.get(key) else {
            return Ok(None);
        };

        let nonce_bytes = BASE64
            .decode(&encrypted.nonce)
            .map_err(|e| ApiError::EncryptionError(format!("Invalid nonce: {}", e)))?;
        let ciphertext = BASE64
            .decode(&encrypted.ciphertext)
            .map_err(|e| ApiError::EncryptionError(format!("Invalid ciphertext: {}", e)))?;

        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())?;

        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|e| ApiError::EncryptionError(format!("Invalid UTF-8: {}", e)))
    }

    /// Remove the given secrets; missing keys are ignored
    pub fn delete(&self, keys: &[String]) -> Result<(), ApiError> {
        let mut file = Self::load_or_create(&self.store_path)?;
        file.secrets.retain(|k, _| !keys.contains(k));
        self.save(&file)
    }

    pub fn store_credentials(&self, account_id: &str, credentials: &Credentials) -> Result<(), ApiError> {
        let [api_key, secret, passphrase] = secret_keys(account_id);
        self.store(&api_key, &credentials.api_key)?;
        self.store(&secret, &credentials.secret_key)?;
        self.store(&passphrase, &credentials.passphrase)?;
        log::info!("Stored encrypted credentials for account {}", account_id);
        Ok(())
    }

    pub fn delete_credentials(&self, account_id: &str) -> Result<(), ApiError> {
        self.delete(&secret_keys(account_id))
    }
}

fn secret_keys(account_id: &str) -> [String; 3] {
    [
        format!("{}-api-key", account_id),
        format!("{}-secret-key", account_id),
        format!("{}-passphrase", account_id),
    ]
}

impl CredentialProvider for SecureStorage {
    fn credentials_for(&self, account_id: &str) -> Result<Option<Credentials>, ApiError> {
        let [api_key, secret, passphrase] = secret_keys(account_id);
        let api_key = self.retrieve(&api_key)?;
        let secret = self.retrieve(&secret)?;
        let passphrase = self.retrieve(&passphrase)?;

        let (Some(api_key), Some(secret_key), Some(passphrase)) = (api_key, secret, passphrase) else {
            return Ok(None);
        };

        let credentials = Credentials {
            api_key,
            secret_key,
            passphrase,
        };

        Ok(credentials.is_usable().then_some(credentials))
    }
}
