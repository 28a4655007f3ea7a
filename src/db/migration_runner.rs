use rusqlite::{params, Connection, OptionalExtension, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const BACKUPS_KEPT: usize = 5;

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub fn new(version: u32, name: &'static str, sql: &'static str) -> Self {
        Self { version, name, sql }
    }

    /// SHA-256 of the SQL text, stored to detect edited migrations
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Applies the embedded schema migrations in version order
pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            migrations: vec![
                Migration::new(
                    0,
                    "schema_migrations",
                    include_str!("migrations/000_schema_migrations.sql"),
                ),
                Migration::new(1, "accounts", include_str!("migrations/001_accounts.sql")),
                Migration::new(
                    2,
                    "billing_runs",
                    include_str!("migrations/002_billing_runs.sql"),
                ),
            ],
        }
    }

    /// Apply every migration newer than the recorded version; returns how many ran
    pub fn run_pending_migrations(&self, conn: &Connection, db_path: &Path) -> Result<usize> {
        let current_version = self.get_current_version(conn)?;

        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| current_version.map_or(true, |v| m.version > v))
            .collect();

        let Some(target) = pending.last() else {
            return Ok(0);
        };

        log::info!(
            "{} pending migration(s), upgrading {:?} -> {}",
            pending.len(),
            current_version,
            target.version
        );

        // Fresh databases have nothing worth backing up
        if current_version.is_some() {
            let backup_path = self.create_backup(conn, db_path, target.version)?;
            log::info!("Backup created: {}", backup_path.display());
        }

        let mut applied = 0;
        for migration in pending {
            if let Err(e) = self.apply_migration(conn, migration) {
                log::error!(
                    "Migration {} ({}) failed and was rolled back: {}",
                    migration.version,
                    migration.name,
                    e
                );
                return Err(e);
            }
            applied += 1;
        }

        Ok(applied)
    }

    fn apply_migration(&self, conn: &Connection, migration: &Migration) -> Result<()> {
        let started = Instant::now();
        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                migration.version,
                migration.name,
                current_timestamp(),
                migration.checksum(),
                started.elapsed().as_millis() as i64
            ],
        )?;

        tx.commit()?;
        log::info!("Applied migration {}: {}", migration.version, migration.name);
        Ok(())
    }

    /// Fail if an applied migration's SQL no longer matches its stored checksum
    pub fn verify_migrations(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare("SELECT version, name, checksum FROM schema_migrations ORDER BY version")?;
        let applied = stmt
            .query_map([], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>>>()?;

        for (version, name, stored) in applied {
            let Some(migration) = self.migrations.iter().find(|m| m.version == version) else {
                log::warn!("Database has migration {} ({}) unknown to this build", version, name);
                continue;
            };

            if migration.checksum() != stored {
                log::error!(
                    "Checksum mismatch for migration {} ({}): expected {}, found {}",
                    version,
                    name,
                    migration.checksum(),
                    stored
                );
                return Err(rusqlite::Error::InvalidQuery);
            }
        }

        Ok(())
    }

    pub fn get_current_version(&self, conn: &Connection) -> Result<Option<u32>> {
        let has_table: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
            [],
            |row| row.get(0),
        )?;
        if !has_table {
            return Ok(None);
        }

        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .optional()
            .map(Option::flatten)
    }

    fn create_backup(&self, conn: &Connection, db_path: &Path, target_version: u32) -> Result<PathBuf> {
        let backup_dir = db_path
            .parent()
            .map(|dir| dir.join("backups"))
            .ok_or_else(|| rusqlite::Error::InvalidPath(db_path.to_path_buf()))?;

        fs::create_dir_all(&backup_dir).map_err(|e| io_failure("create backup directory", e))?;

        let backup_path = backup_dir.join(format!(
            "pre_migration_v{}_{}.db",
            target_version,
            current_timestamp()
        ));

        conn.backup(rusqlite::DatabaseName::Main, &backup_path, None)?;

        self.cleanup_old_backups(&backup_dir);
        Ok(backup_path)
    }

    fn cleanup_old_backups(&self, backup_dir: &Path) {
        let entries = match fs::read_dir(backup_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to read backup directory: {}", e);
                return;
            }
        };

        let mut backups: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("pre_migration_") && name.ends_with(".db"))
            })
            .collect();

        backups.sort_by_key(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        });

        let excess = backups.len().saturating_sub(BACKUPS_KEPT);
        for entry in backups.iter().take(excess) {
            if let Err(e) = fs::remove_file(entry.path()) {
                log::warn!("Failed to delete old backup: {}", e);
            }
        }
    }
}

fn io_failure(action: &str, e: std::io::Error) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(1),
        Some(format!("Failed to {}: {}", action, e)),
    )
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
