//! Content-addressed artifact cache.
//!
//! Parsed transcripts and feature records are stored as JSON in a local
//! SQLite database, keyed by a hash of every input that affects them.
//! A changed input yields a new key, so stale entries are never served.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use earnings_core::{EarningsError, Result};

/// Artifact families sharing the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Parse,
    Features,
}

impl ArtifactKind {
    fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Parse => "parse",
            ArtifactKind::Features => "features",
        }
    }
}

// ── Artifact Store ──────────────────────────────────────────────────

pub struct ArtifactStore {
    conn: Mutex<Connection>,
}

impl ArtifactStore {
    /// Open (or create) the cache database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_tables()?;
        info!("🗄️ Artifact cache at {}", path.as_ref().display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_tables()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EarningsError::Cache("connection lock poisoned".into()))
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS artifacts (
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (kind, key)
            );",
        )?;
        Ok(())
    }

    /// Cached artifact for `key`. An entry that no longer deserializes is
    /// treated as a miss.
    pub fn get<T: DeserializeOwned>(&self, kind: ArtifactKind, key: &str) -> Result<Option<T>> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM artifacts WHERE kind = ?1 AND key = ?2",
                params![kind.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else {
            return Ok(None);
        };
        match serde_json::from_str(&payload) {
            Ok(value) => {
                debug!("Cache hit: {} {}", kind.as_str(), key);
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Discarding unreadable {} cache entry {}: {}", kind.as_str(), key, e);
                Ok(None)
            }
        }
    }

    pub fn put<T: Serialize>(&self, kind: ArtifactKind, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO artifacts (kind, key, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), key, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn count(&self, kind: ArtifactKind) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM artifacts WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
