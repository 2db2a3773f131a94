use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::EngineError;

// ============================================================================
// STORAGE ROWS
// ============================================================================

/// Manual reward or deduction entered by management.
///
/// Gold entries bypass points entirely; the `[GOLD]` description tag is an
/// alternative to the explicit flag (see `manual::is_gold_entry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntry {
    #[serde(rename = "Player_Name", alias = "player_name")]
    pub player_name: String,

    #[serde(rename = "Description", alias = "description")]
    pub description: String,

    #[serde(rename = "Points", alias = "points")]
    pub points: f64,

    #[serde(rename = "Is_Gold", alias = "is_gold", default)]
    pub is_gold: bool,
}

impl ManualEntry {
    /// Idempotency hash for re-import deduplication.
    /// Dedup key, NOT identity - two management edits with the same
    /// content collapse into one row on purpose.
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.player_name.trim().to_lowercase(),
            self.description.trim(),
            self.points,
            self.is_gold
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// One frozen panel row of a locked event. Read-only to the engine;
/// management edits `point_value_edited` through the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub panel_key: String,
    pub character_name: String,
    pub character_class: String,
    pub point_value_original: f64,
    pub point_value_edited: Option<f64>,
}

impl SnapshotEntry {
    /// Edited value wins when present
    pub fn effective_value(&self) -> f64 {
        self.point_value_edited.unwrap_or(self.point_value_original)
    }
}

// ============================================================================
// CONNECTION POOL
// ============================================================================

/// Bounded SQLite connection pool.
///
/// Every request path acquires through the semaphore with a deadline:
/// waiting past it surfaces as `EngineError::PoolExhausted`. The checked-out
/// connection rides in a guard that pushes it back on drop, so success,
/// error and timeout paths all release.
#[derive(Clone)]
pub struct Db {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    connections: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
}

/// RAII guard over one pooled connection
pub struct PooledConn {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Return the connection before the permit releases (field drop
            // runs after this body), so a waiter never pops an empty pool.
            self.pool
                .connections
                .lock()
                .expect("pool mutex poisoned")
                .push(conn);
        }
    }
}

impl Db {
    /// Open the database file, run schema setup, and fill the pool.
    pub fn open<P: AsRef<Path>>(
        path: P,
        pool_size: usize,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool_size = pool_size.max(1);
        let mut connections = Vec::with_capacity(pool_size);

        for i in 0..pool_size {
            let conn = Connection::open(path.as_ref())
                .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;

            // Enable WAL mode for concurrent readers + crash recovery
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.busy_timeout(Duration::from_secs(5))?;

            if i == 0 {
                setup_schema(&conn)?;
            }

            connections.push(conn);
        }

        Ok(Db {
            inner: Arc::new(PoolInner {
                connections: Mutex::new(connections),
                permits: Arc::new(Semaphore::new(pool_size)),
                acquire_timeout,
            }),
        })
    }

    /// Acquire a connection, waiting at most the configured deadline.
    pub async fn acquire(&self) -> Result<PooledConn, EngineError> {
        let waited = self.inner.acquire_timeout;

        let permit =
            tokio::time::timeout(waited, Arc::clone(&self.inner.permits).acquire_owned())
                .await
                .map_err(|_| EngineError::PoolExhausted {
                    waited_ms: waited.as_millis() as u64,
                })?
                .map_err(|e| {
                    EngineError::Computation(anyhow::anyhow!("pool semaphore closed: {e}"))
                })?;

        let conn = self
            .inner
            .connections
            .lock()
            .expect("pool mutex poisoned")
            .pop()
            .expect("permit held but pool empty");

        Ok(PooledConn {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS raid_events (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            locked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Materialized upstream datasets, one JSON document per (event, name).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS datasets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(event_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS manual_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            entry_hash TEXT UNIQUE NOT NULL,
            player_name TEXT NOT NULL,
            description TEXT NOT NULL,
            points REAL NOT NULL,
            is_gold INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshot_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            panel_key TEXT NOT NULL,
            character_name TEXT NOT NULL,
            character_class TEXT NOT NULL DEFAULT 'Unknown',
            point_value_original REAL NOT NULL,
            point_value_edited REAL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_datasets_event ON datasets(event_id, name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_manual_event ON manual_entries(event_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshot_event ON snapshot_entries(event_id, panel_key)",
        [],
    )?;

    Ok(())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============================================================================
// RAID EVENTS
// ============================================================================

pub fn ensure_event(conn: &Connection, event_id: i64, title: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO raid_events (id, title, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO NOTHING",
        params![event_id, title, now_rfc3339()],
    )
    .context("Failed to ensure raid event")?;
    Ok(())
}

pub fn set_event_locked(conn: &Connection, event_id: i64, locked: bool) -> Result<()> {
    ensure_event(conn, event_id, "")?;
    conn.execute(
        "UPDATE raid_events SET locked = ?1 WHERE id = ?2",
        params![locked as i64, event_id],
    )
    .context("Failed to update lock flag")?;
    Ok(())
}

/// Missing event reads as unlocked - auto mode is the default everywhere.
pub fn is_event_locked(conn: &Connection, event_id: i64) -> Result<bool> {
    let locked: Option<i64> = conn
        .query_row(
            "SELECT locked FROM raid_events WHERE id = ?1",
            params![event_id],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to read lock flag")?;

    Ok(locked.unwrap_or(0) != 0)
}

// ============================================================================
// DATASETS
// ============================================================================

pub fn upsert_dataset(conn: &Connection, event_id: i64, name: &str, payload: &str) -> Result<()> {
    // Validate it really is JSON before it hits the table
    serde_json::from_str::<serde_json::Value>(payload)
        .with_context(|| format!("Dataset '{}' is not valid JSON", name))?;

    conn.execute(
        "INSERT INTO datasets (event_id, name, payload, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(event_id, name) DO UPDATE SET payload = ?3, updated_at = ?4",
        params![event_id, name, payload, now_rfc3339()],
    )
    .with_context(|| format!("Failed to upsert dataset '{}'", name))?;

    Ok(())
}

pub fn get_dataset_payload(conn: &Connection, event_id: i64, name: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT payload FROM datasets WHERE event_id = ?1 AND name = ?2",
        params![event_id, name],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("Failed to read dataset '{}'", name))
}

// ============================================================================
// MANUAL ENTRIES
// ============================================================================

/// Insert manual entries, skipping duplicates by idempotency hash.
/// Returns the number of rows actually inserted.
pub fn insert_manual_entries(
    conn: &Connection,
    event_id: i64,
    entries: &[ManualEntry],
) -> Result<usize> {
    let mut inserted = 0;

    for entry in entries {
        let hash = entry.compute_idempotency_hash();

        let result = conn.execute(
            "INSERT OR IGNORE INTO manual_entries
                (event_id, entry_hash, player_name, description, points, is_gold, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event_id,
                hash,
                entry.player_name,
                entry.description,
                entry.points,
                entry.is_gold as i64,
                now_rfc3339(),
            ],
        )?;

        inserted += result;
    }

    Ok(inserted)
}

pub fn get_manual_entries(conn: &Connection, event_id: i64) -> Result<Vec<ManualEntry>> {
    let mut stmt = conn.prepare(
        "SELECT player_name, description, points, is_gold
         FROM manual_entries WHERE event_id = ?1 ORDER BY id",
    )?;

    let rows = stmt.query_map(params![event_id], |row| {
        Ok(ManualEntry {
            player_name: row.get(0)?,
            description: row.get(1)?,
            points: row.get(2)?,
            is_gold: row.get::<_, i64>(3)? != 0,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row.context("Failed to read manual entry")?);
    }

    Ok(entries)
}

/// Load manual entries from a management CSV export
pub fn load_manual_entries_csv(path: &Path) -> Result<Vec<ManualEntry>> {
    let mut rdr = csv::Reader::from_path(path).context("Failed to open manual entries CSV")?;

    let mut entries = Vec::new();
    for result in rdr.deserialize() {
        let entry: ManualEntry = result.context("Failed to deserialize manual entry")?;
        entries.push(entry);
    }

    Ok(entries)
}

// ============================================================================
// SNAPSHOT ENTRIES
// ============================================================================

pub fn insert_snapshot_entries(
    conn: &Connection,
    event_id: i64,
    entries: &[SnapshotEntry],
) -> Result<usize> {
    let mut inserted = 0;

    for entry in entries {
        inserted += conn.execute(
            "INSERT INTO snapshot_entries
                (event_id, panel_key, character_name, character_class,
                 point_value_original, point_value_edited, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event_id,
                entry.panel_key,
                entry.character_name,
                entry.character_class,
                entry.point_value_original,
                entry.point_value_edited,
                now_rfc3339(),
            ],
        )?;
    }

    Ok(inserted)
}

pub fn get_snapshot_entries(conn: &Connection, event_id: i64) -> Result<Vec<SnapshotEntry>> {
    let mut stmt = conn.prepare(
        "SELECT panel_key, character_name, character_class,
                point_value_original, point_value_edited
         FROM snapshot_entries WHERE event_id = ?1 ORDER BY id",
    )?;

    let rows = stmt.query_map(params![event_id], |row| {
        Ok(SnapshotEntry {
            panel_key: row.get(0)?,
            character_name: row.get(1)?,
            character_class: row.get(2)?,
            point_value_original: row.get(3)?,
            point_value_edited: row.get(4)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row.context("Failed to read snapshot entry")?);
    }

    Ok(entries)
}

pub fn clear_snapshot(conn: &Connection, event_id: i64) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM snapshot_entries WHERE event_id = ?1",
        params![event_id],
    )?;
    Ok(deleted)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "raid_ledger_test_{}_{}.db",
            std::process::id(),
            tag
        ))
    }

    fn open_test_db(tag: &str) -> (Db, std::path::PathBuf) {
        let path = temp_db_path(tag);
        let _ = std::fs::remove_file(&path);
        let db = Db::open(&path, 2, Duration::from_millis(200)).unwrap();
        (db, path)
    }

    #[tokio::test]
    async fn test_dataset_roundtrip() {
        let (db, path) = open_test_db("dataset_roundtrip");
        let conn = db.acquire().await.unwrap();

        upsert_dataset(&conn, 1, "streaks", r#"[{"name":"Foo","count":8}]"#).unwrap();
        let payload = get_dataset_payload(&conn, 1, "streaks").unwrap();
        assert_eq!(payload.as_deref(), Some(r#"[{"name":"Foo","count":8}]"#));

        // Upsert replaces
        upsert_dataset(&conn, 1, "streaks", "[]").unwrap();
        let payload = get_dataset_payload(&conn, 1, "streaks").unwrap();
        assert_eq!(payload.as_deref(), Some("[]"));

        // Missing dataset reads as None, never an error
        assert!(get_dataset_payload(&conn, 1, "potions").unwrap().is_none());

        drop(conn);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_invalid_dataset_payload_rejected() {
        let (db, path) = open_test_db("bad_payload");
        let conn = db.acquire().await.unwrap();

        assert!(upsert_dataset(&conn, 1, "streaks", "not json").is_err());

        drop(conn);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_manual_entry_dedup_on_reimport() {
        let (db, path) = open_test_db("manual_dedup");
        let conn = db.acquire().await.unwrap();

        let entries = vec![
            ManualEntry {
                player_name: "Foo".to_string(),
                description: "[GOLD] bonus".to_string(),
                points: 500.0,
                is_gold: false,
            },
            ManualEntry {
                player_name: "Bar".to_string(),
                description: "late penalty".to_string(),
                points: -20.0,
                is_gold: false,
            },
        ];

        assert_eq!(insert_manual_entries(&conn, 7, &entries).unwrap(), 2);
        // Re-import is a no-op
        assert_eq!(insert_manual_entries(&conn, 7, &entries).unwrap(), 0);
        assert_eq!(get_manual_entries(&conn, 7).unwrap().len(), 2);

        drop(conn);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_lock_flag_defaults_to_unlocked() {
        let (db, path) = open_test_db("lock_flag");
        let conn = db.acquire().await.unwrap();

        assert!(!is_event_locked(&conn, 42).unwrap());
        set_event_locked(&conn, 42, true).unwrap();
        assert!(is_event_locked(&conn, 42).unwrap());
        set_event_locked(&conn, 42, false).unwrap();
        assert!(!is_event_locked(&conn, 42).unwrap());

        drop(conn);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_snapshot_effective_value() {
        let entry = SnapshotEntry {
            panel_key: "damage_rank".to_string(),
            character_name: "Foo".to_string(),
            character_class: "Mage".to_string(),
            point_value_original: 30.0,
            point_value_edited: Some(25.0),
        };
        assert_eq!(entry.effective_value(), 25.0);

        let untouched = SnapshotEntry {
            point_value_edited: None,
            ..entry
        };
        assert_eq!(untouched.effective_value(), 30.0);
    }

    #[tokio::test]
    async fn test_pool_exhaustion_and_release() {
        let path = temp_db_path("pool");
        let _ = std::fs::remove_file(&path);
        let db = Db::open(&path, 1, Duration::from_millis(50)).unwrap();

        let held = db.acquire().await.unwrap();

        // Second acquire must fail with the pool-exhaustion error, not hang
        match db.acquire().await {
            Err(EngineError::PoolExhausted { .. }) => {}
            other => panic!("expected PoolExhausted, got {:?}", other.map(|_| ())),
        }

        // Dropping the guard releases the connection for the next caller
        drop(held);
        let reacquired = db.acquire().await;
        assert!(reacquired.is_ok());

        drop(reacquired);
        let _ = std::fs::remove_file(&path);
    }
}
