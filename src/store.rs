use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreResult;

/// Namespace prefix for every collection key.
pub const KEY_PREFIX: &str = "jobtrack:";

const CORRUPT_SUFFIX: &str = ".corrupt";

/// Best-effort key/value persistence over a single SQLite table.
///
/// Every public operation swallows and logs failures: a failed read looks
/// exactly like a missing key, a failed write is a logged no-op. Callers must
/// treat "faulted" and "empty" the same way.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the backing file. Does not touch the schema; call
    /// [`Store::init`] before use.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        debug!(path = ?self.path, "store initialized");
        Ok(())
    }

    /// Close the connection. Pending statements are finalized by SQLite.
    pub fn teardown(self) {
        if let Err((_, err)) = self.conn.close() {
            warn!(error = %err, "store close failed");
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.read_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "store read failed; treating key as absent");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "stored value is not valid JSON; treating key as absent");
                self.quarantine(key, &raw);
                None
            }
        }
    }

    /// Serialize and write `value`. Returns whether the write landed.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let result = serde_json::to_string(value)
            .map_err(Into::into)
            .and_then(|raw| self.write_raw(key, &raw));
        match result {
            Ok(()) => {
                debug!(key, "store write");
                true
            }
            Err(err) => {
                warn!(key, error = %err, "store write failed; value not persisted");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(err) = self.conn.execute("DELETE FROM kv WHERE key = ?1", [key]) {
            warn!(key, error = %err, "store remove failed");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.conn.execute("DELETE FROM kv", []) {
            warn!(error = %err, "store clear failed");
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        let found: rusqlite::Result<Option<i64>> = self
            .conn
            .query_row("SELECT 1 FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional();
        match found {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(key, error = %err, "store exists check failed");
                false
            }
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let result: StoreResult<Vec<String>> = (|| {
            let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            Ok(rows.collect::<Result<Vec<String>, _>>()?)
        })();
        result.unwrap_or_else(|err| {
            warn!(error = %err, "store key listing failed");
            Vec::new()
        })
    }

    fn read_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let raw = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(raw)
    }

    fn write_raw(&self, key: &str, raw: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, raw, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Copy `value` aside under a backup key derived from `key`. Earlier
    /// backups are never overwritten. Returns the key written, if any.
    pub fn set_aside<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Option<String> {
        let target = self.backup_key(key);
        if self.set(&target, value) {
            warn!(key, backup = %target, "payload copied aside");
            Some(target)
        } else {
            None
        }
    }

    /// `<key>.corrupt` when free, else the first free `<key>.corrupt.<n>`.
    pub fn backup_key(&self, key: &str) -> String {
        let base = format!("{key}{CORRUPT_SUFFIX}");
        if !self.exists(&base) {
            return base;
        }
        (1u32..)
            .map(|n| format!("{base}.{n}"))
            .find(|candidate| !self.exists(candidate))
            .unwrap_or(base)
    }

    #[cfg(test)]
    pub(crate) fn reject_writes_to(&self, key: &str) {
        let sql = format!(
            "CREATE TEMP TRIGGER IF NOT EXISTS reject_writes BEFORE INSERT ON kv
             WHEN NEW.key = '{}'
             BEGIN SELECT RAISE(ABORT, 'writes rejected'); END;",
            key.replace('\'', "''")
        );
        self.conn.execute_batch(&sql).expect("install trigger");
    }

    // Keep the unreadable payload around before a reseed overwrites it.
    fn quarantine(&self, key: &str, raw: &str) {
        let target = self.backup_key(key);
        match self.write_raw(&target, raw) {
            Ok(()) => warn!(key, backup = %target, "corrupt payload copied aside"),
            Err(err) => warn!(key, error = %err, "could not copy corrupt payload aside"),
        }
    }
}

pub fn namespaced(collection: &str) -> String {
    format!("{KEY_PREFIX}{collection}")
}
