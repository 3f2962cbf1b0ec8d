//! Local SQLite database layer for Cafe Counter.
//!
//! Uses rusqlite with WAL mode. Holds the durable client-side state: the
//! `local_settings` category/key/value store (persisted cart/session blob,
//! theme, legacy customer blob) and the per-audience `menu_cache`.

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Tauri managed state holding the database connection.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Initialize the database at `{app_data_dir}/cafe.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(app_data_dir: &Path) -> Result<DbState, String> {
    fs::create_dir_all(app_data_dir).map_err(|e| format!("Failed to create data dir: {e}"))?;

    let db_path = app_data_dir.join("cafe.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                let wal = db_path.with_extension("db-wal");
                let shm = db_path.with_extension("db-shm");
                let _ = fs::remove_file(&wal);
                let _ = fs::remove_file(&shm);
            }
            open_and_configure(&db_path)
                .map_err(|e| format!("Database open failed after retry: {e}"))?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| format!("pragma setup: {e}"))?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("create schema_version: {e}"))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Migration v1: settings store.
fn migrate_v1(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        -- local_settings (category/key/value store)
        CREATE TABLE IF NOT EXISTS local_settings (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(setting_category, setting_key)
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| format!("migration v1: {e}"))?;
    Ok(())
}

/// Migration v2: per-audience menu cache.
fn migrate_v2(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS menu_cache (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            cache_key TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            version TEXT,
            updated_at TEXT DEFAULT (datetime('now'))
        );

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )
    .map_err(|e| format!("migration v2: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

/// Read a setting value, or `None` when absent.
pub fn get_setting(conn: &Connection, category: &str, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT setting_value FROM local_settings
         WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get(0),
    )
    .ok()
}

/// Upsert a setting value.
pub fn set_setting(conn: &Connection, category: &str, key: &str, value: &str) -> Result<(), String> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )
    .map_err(|e| format!("set_setting [{category}/{key}]: {e}"))?;
    Ok(())
}

/// Delete a setting. No-op when absent.
pub fn delete_setting(conn: &Connection, category: &str, key: &str) -> Result<(), String> {
    conn.execute(
        "DELETE FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
    )
    .map_err(|e| format!("delete_setting [{category}/{key}]: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON blob helpers
// ---------------------------------------------------------------------------

/// Read a JSON blob from the `local` settings category. Malformed or
/// missing blobs resolve to `Value::Null` rather than erroring.
pub fn read_local_json(db: &DbState, key: &str) -> Result<serde_json::Value, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    if let Some(raw) = get_setting(&conn, "local", key) {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&raw) {
            return Ok(parsed);
        }
        warn!(key, "local JSON blob is malformed, treating as empty");
    }
    Ok(serde_json::Value::Null)
}

/// Write a JSON blob into the `local` settings category.
pub fn write_local_json(db: &DbState, key: &str, value: &serde_json::Value) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    set_setting(&conn, "local", key, &value.to_string())
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// Run all migrations against an arbitrary (typically in-memory) connection.
#[doc(hidden)]
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("test migrations");
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        run_migrations_for_test(&conn);
        DbState {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        }
    }

    #[test]
    fn test_settings_roundtrip() {
        let db = test_db();
        let conn = db.conn.lock().unwrap();

        assert_eq!(get_setting(&conn, "ui", "theme"), None);
        set_setting(&conn, "ui", "theme", "dark").unwrap();
        assert_eq!(get_setting(&conn, "ui", "theme"), Some("dark".to_string()));

        // Upsert replaces
        set_setting(&conn, "ui", "theme", "light").unwrap();
        assert_eq!(get_setting(&conn, "ui", "theme"), Some("light".to_string()));

        delete_setting(&conn, "ui", "theme").unwrap();
        assert_eq!(get_setting(&conn, "ui", "theme"), None);
    }

    #[test]
    fn test_local_json_coerces_malformed_to_null() {
        let db = test_db();
        {
            let conn = db.conn.lock().unwrap();
            set_setting(&conn, "local", "cart_state", "{not json").unwrap();
        }
        assert_eq!(
            read_local_json(&db, "cart_state").unwrap(),
            serde_json::Value::Null
        );

        write_local_json(&db, "cart_state", &serde_json::json!({"lines": []})).unwrap();
        assert_eq!(
            read_local_json(&db, "cart_state").unwrap(),
            serde_json::json!({"lines": []})
        );
    }
}
