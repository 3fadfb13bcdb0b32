//! Database module for Duck Generator
//! SQLite cache for platform storage values and the signed-in session

use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Persisted platform session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub access_token: String,
    pub email: String,
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let db = Self::with_connection(Connection::open(path)?)?;
        debug!(path = %path.display(), "Database opened");
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-query;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                dirty INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                access_token TEXT NOT NULL,
                email TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a stored value (raw JSON text)
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    /// Set a stored value. `dirty` marks it as not yet pushed to the platform.
    pub fn set_value(&self, key: &str, value: &str, dirty: bool) -> Result<()> {
        self.conn().execute(
            "INSERT INTO storage (key, value, dirty) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, dirty = excluded.dirty",
            params![key, value, dirty as i32],
        )?;
        Ok(())
    }

    /// Caches a pulled value unless a local edit is still waiting to be pushed.
    /// Returns false when the local edit won.
    pub fn set_value_if_clean(&self, key: &str, value: &str) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT INTO storage (key, value, dirty) VALUES (?1, ?2, 0)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value WHERE storage.dirty = 0",
            params![key, value],
        )?;
        Ok(changed > 0)
    }

    pub fn mark_clean(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("UPDATE storage SET dirty = 0 WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Keys with local changes that haven't reached the platform yet
    pub fn dirty_keys(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM storage WHERE dirty = 1 ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(keys)
    }

    /// Email of the account the cached storage values belong to
    pub fn storage_owner(&self) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM meta WHERE key = 'storage_owner'",
                [],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_storage_owner(&self, email: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO meta (key, value) VALUES ('storage_owner', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![email],
        )?;
        Ok(())
    }

    /// Drops every cached value and its owner
    pub fn clear_storage(&self) -> Result<()> {
        self.conn().execute_batch(
            "DELETE FROM storage;
             DELETE FROM meta WHERE key = 'storage_owner';",
        )?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<SessionRow>> {
        self.conn()
            .query_row(
                "SELECT access_token, email FROM session WHERE id = 1",
                [],
                |row| {
                    Ok(SessionRow {
                        access_token: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()
    }

    pub fn save_session(&self, session: &SessionRow) -> Result<()> {
        self.conn().execute(
            "INSERT INTO session (id, access_token, email) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                email = excluded.email",
            params![session.access_token, session.email],
        )?;
        Ok(())
    }

    pub fn clear_session(&self) -> Result<()> {
        self.conn().execute("DELETE FROM session", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_round_trip_and_upsert() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_value("duck-history").unwrap(), None);

        db.set_value("duck-history", "[]", false).unwrap();
        db.set_value("duck-history", "[1]", true).unwrap();
        assert_eq!(db.get_value("duck-history").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn dirty_tracking() {
        let db = Database::open_in_memory().unwrap();
        db.set_value("a", "1", true).unwrap();
        db.set_value("b", "2", false).unwrap();
        assert_eq!(db.dirty_keys().unwrap(), vec!["a".to_string()]);

        db.mark_clean("a").unwrap();
        assert!(db.dirty_keys().unwrap().is_empty());
    }

    #[test]
    fn single_session_row() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_session().unwrap(), None);

        let first = SessionRow {
            access_token: "t1".into(),
            email: "a@example.com".into(),
        };
        let second = SessionRow {
            access_token: "t2".into(),
            email: "b@example.com".into(),
        };
        db.save_session(&first).unwrap();
        db.save_session(&second).unwrap();
        assert_eq!(db.load_session().unwrap(), Some(second));

        db.clear_session().unwrap();
        assert_eq!(db.load_session().unwrap(), None);
    }

    #[test]
    fn pulled_value_does_not_overwrite_local_edit() {
        let db = Database::open_in_memory().unwrap();
        db.set_value("duck-history", "[\"local\"]", true).unwrap();
        assert!(!db.set_value_if_clean("duck-history", "[\"remote\"]").unwrap());
        assert_eq!(db.get_value("duck-history").unwrap().as_deref(), Some("[\"local\"]"));
        assert_eq!(db.dirty_keys().unwrap(), vec!["duck-history".to_string()]);

        db.mark_clean("duck-history").unwrap();
        assert!(db.set_value_if_clean("duck-history", "[\"remote\"]").unwrap());
        assert_eq!(db.get_value("duck-history").unwrap().as_deref(), Some("[\"remote\"]"));

        assert!(db.set_value_if_clean("new-key", "1").unwrap());
        assert!(db.dirty_keys().unwrap().is_empty());
    }

    #[test]
    fn clearing_storage_forgets_owner() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.storage_owner().unwrap(), None);
        db.set_storage_owner("a@example.com").unwrap();
        db.set_value("duck-history", "[]", true).unwrap();
        assert_eq!(db.storage_owner().unwrap().as_deref(), Some("a@example.com"));

        db.clear_storage().unwrap();
        assert_eq!(db.storage_owner().unwrap(), None);
        assert_eq!(db.get_value("duck-history").unwrap(), None);
        assert!(db.dirty_keys().unwrap().is_empty());
    }
}
