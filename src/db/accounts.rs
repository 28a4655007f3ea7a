use chrono::Utc;
use rusqlite::{params, OptionalExtension, Result, Row};

use super::Database;
use crate::models::{AccountCredential, AccountIdentity};

const ACCOUNT_COLUMNS: &str = "id, name, email, label, exchange, api_key_preview, is_active,
     last_billed_timestamp, created_at, updated_at";

fn account_from_row(row: &Row<'_>) -> Result<AccountCredential> {
    Ok(AccountCredential {
        identity: AccountIdentity {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            label: row.get(3)?,
        },
        exchange: row.get(4)?,
        api_key_preview: row.get(5)?,
        is_active: row.get::<_, i32>(6)? == 1,
        last_billed_timestamp: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Database {
    /// Insert or update an account; `created_at` and billing state survive updates
    pub fn upsert_account(
        &self,
        identity: &AccountIdentity,
        exchange: &str,
        api_key_preview: &str,
        is_active: bool,
    ) -> Result<AccountCredential> {
        let now = Utc::now().timestamp();

        self.conn.execute(
            "INSERT INTO accounts
                (id, name, email, label, exchange, api_key_preview, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                label = excluded.label,
                exchange = excluded.exchange,
                api_key_preview = excluded.api_key_preview,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
            params![
                &identity.id,
                &identity.name,
                &identity.email,
                &identity.label,
                exchange,
                api_key_preview,
                is_active as i32,
                now,
            ],
        )?;

        self.get_account(&identity.id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn get_account(&self, id: &str) -> Result<Option<AccountCredential>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS),
                [id],
                account_from_row,
            )
            .optional()
    }

    pub fn list_accounts(&self) -> Result<Vec<AccountCredential>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM accounts ORDER BY created_at, id", ACCOUNT_COLUMNS))?;
        let accounts = stmt.query_map([], account_from_row)?.collect();
        accounts
    }

    /// Identities of the accounts a run should bill, in registration order
    pub fn active_accounts(&self) -> Result<Vec<AccountIdentity>> {
        Ok(self
            .list_accounts()?
            .into_iter()
            .filter(|account| account.is_active)
            .map(|account| account.identity)
            .collect())
    }

    /// Returns false when no such account exists
    pub fn set_active(&self, id: &str, is_active: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE accounts SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_active as i32, Utc::now().timestamp(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn remove_account(&self, id: &str) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }
}
