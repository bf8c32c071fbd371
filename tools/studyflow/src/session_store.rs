use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

use crate::errors::StudyError;
use crate::logging::append_run_log;
use crate::session::SessionState;

type StoreResult<T> = Result<T, StudyError>;

/// SQLite-backed map from session token to `SessionState`.
pub struct SessionStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SessionStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        append_run_log(
            "info",
            "session_store.open",
            json!({ "path": path.display().to_string() }),
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StudyError::Database(e.to_string()))?;
        }

        let existed_before_open = path.exists();

        // Zero-byte files are left behind by interrupted writes.
        if existed_before_open {
            let meta =
                std::fs::metadata(&path).map_err(|e| StudyError::Database(e.to_string()))?;
            if meta.len() == 0 {
                return Err(StudyError::Database(format!(
                    "session database is 0 bytes (corrupt): {}",
                    path.display()
                )));
            }
        }

        let mut conn = Connection::open(&path).map_err(db_err)?;
        configure_connection(&conn)?;

        if existed_before_open {
            let integrity: String = conn
                .pragma_query_value(None, "quick_check", |row| row.get(0))
                .map_err(db_err)?;
            if integrity != "ok" {
                return Err(StudyError::Database(format!(
                    "session database failed integrity check: {integrity}"
                )));
            }
        }

        run_migrations(&mut conn)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.clone()),
        };
        append_run_log(
            "info",
            "session_store.opened",
            json!({
                "path": path.display().to_string(),
                "sessions": store.count()?,
            }),
        );
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory().map_err(db_err)?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn load(&self, token: &str) -> StoreResult<Option<SessionState>> {
        let raw: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT state_json FROM sessions WHERE token = ?1",
                [token],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
        })?;
        raw.map(|text| {
            serde_json::from_str(&text).map_err(|e| StudyError::Serialization(e.to_string()))
        })
        .transpose()
    }

    pub fn save(&self, token: &str, state: &SessionState) -> StoreResult<()> {
        let text =
            serde_json::to_string(state).map_err(|e| StudyError::Serialization(e.to_string()))?;
        let now = system_time_unix();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions(token, state_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(token) DO UPDATE SET
                   state_json = excluded.state_json,
                   updated_at = excluded.updated_at",
                params![token, text, now],
            )
            .map_err(db_err)
        })?;
        append_run_log(
            "debug",
            "session_store.saved",
            json!({
                "phase": state.phase().as_str(),
                "current_trial": state.current_trial,
                "responses": state.responses.len(),
            }),
        );
        Ok(())
    }

    pub fn delete(&self, token: &str) -> StoreResult<bool> {
        let removed = self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", [token])
                .map_err(db_err)
        })?;
        Ok(removed > 0)
    }

    /// Drops sessions not saved since `cutoff_ms` (unix millis).
    pub fn purge_idle(&self, cutoff_ms: i64) -> StoreResult<usize> {
        let removed = self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE updated_at < ?1", [cutoff_ms])
                .map_err(db_err)
        })?;
        if removed > 0 {
            append_run_log(
                "info",
                "session_store.purged",
                json!({ "removed": removed, "cutoff_ms": cutoff_ms }),
            );
        }
        Ok(removed)
    }

    pub fn count(&self) -> StoreResult<usize> {
        let count: i64 = self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .map_err(db_err)
        })?;
        Ok(count.max(0) as usize)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| StudyError::Database("session connection lock poisoned".to_string()))?;
        f(&guard)
    }
}

fn configure_connection(conn: &Connection) -> StoreResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(db_err)?;
    conn.pragma_update(None, "synchronous", "FULL")
        .map_err(db_err)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(db_err)?;
    Ok(())
}

fn run_migrations(conn: &mut Connection) -> StoreResult<()> {
    let migrations = [(1_i64, include_str!("../migrations/0001_sessions.sql"))];

    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL);")
        .map_err(db_err)?;

    for (version, sql) in migrations {
        let exists = conn
            .query_row(
                "SELECT 1 FROM schema_migrations WHERE version = ?1 LIMIT 1",
                [version],
                |_| Ok(()),
            )
            .optional()
            .map_err(db_err)?
            .is_some();

        if exists {
            continue;
        }

        let tx = conn.transaction().map_err(db_err)?;
        tx.execute_batch(sql).map_err(db_err)?;
        tx.execute(
            "INSERT INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            params![version, system_time_unix()],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        append_run_log(
            "info",
            "session_store.migration.applied",
            json!({ "version": version }),
        );
    }

    Ok(())
}

fn db_err(error: rusqlite::Error) -> StudyError {
    StudyError::Database(error.to_string())
}

pub fn system_time_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
