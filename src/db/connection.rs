use rusqlite::{Connection, Result};
use std::path::Path;

use crate::db::migration_runner::MigrationRunner;

/// Account registry and billing history
pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Could not create {}: {}", parent.display(), e);
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::prepare(conn, db_path)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?, Path::new(":memory:"))
    }

    fn prepare(conn: Connection, db_path: &Path) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let runner = MigrationRunner::new();
        let applied = runner.run_pending_migrations(&conn, db_path)?;
        if applied > 0 {
            log::info!("Applied {} migration(s) to {}", applied, db_path.display());
        } else {
            log::debug!("Schema of {} is up to date", db_path.display());
        }

        runner.verify_migrations(&conn)?;

        Ok(Database { conn })
    }
}
