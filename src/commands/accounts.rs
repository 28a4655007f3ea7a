use crate::api::{ApiError, SecureStorage};
use crate::billing::BillingError;
use crate::db::Database;
use crate::models::{AccountCredential, AccountInput};

/// Register or update an account; secrets go to the encrypted store only
pub fn add_account(
    db: &Database,
    storage: &SecureStorage,
    input: AccountInput,
) -> Result<AccountCredential, BillingError> {
    if !input.credentials.is_usable() {
        return Err(ApiError::InvalidCredentials(input.identity.id.clone()).into());
    }
    if input.identity.id.trim().is_empty() {
        return Err(BillingError::Config("account id must not be empty".to_string()));
    }

    storage.store_credentials(&input.identity.id, &input.credentials)?;

    let preview = AccountCredential::create_preview(&input.credentials.api_key);
    let account = db.upsert_account(
        &input.identity,
        &input.exchange,
        &preview,
        input.is_active.unwrap_or(true),
    )?;

    log::info!("Registered account {} ({})", account.identity.id, preview);
    Ok(account)
}

pub fn list_accounts(db: &Database) -> Result<Vec<AccountCredential>, BillingError> {
    Ok(db.list_accounts()?)
}

/// Drop the registry row and the stored secrets; false if the account was unknown
pub fn remove_account(db: &Database, storage: &SecureStorage, account_id: &str) -> Result<bool, BillingError> {
    storage.delete_credentials(account_id)?;
    let removed = db.remove_account(account_id)?;
    if removed {
        log::info!("Removed account {}", account_id);
    }
    Ok(removed)
}

pub fn set_account_active(db: &Database, account_id: &str, is_active: bool) -> Result<bool, BillingError> {
    Ok(db.set_active(account_id, is_active)?)
}
