//! Versioned schema for the durable store.
//!
//! Applied versions are recorded in `_migrations`. The JSON payload kept in
//! `storage` carries no version of its own; its shape is handled by lenient
//! decoding instead.

use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{Connection, OptionalExtension};

use super::Error;

/// One schema step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version. Each step is applied at most once.
const MIGRATIONS: &[Migration] =
    &[Migration { version: 1, name: "storage", sql: include_str!("../../migrations/001_storage.sql") }];

/// Highest applied version, 0 on a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i64, Error> {
    let version = conn
        .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get::<_, Option<i64>>(0))
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

/// Apply every migration newer than the current schema version.
///
/// Each step runs in its own transaction together with its `_migrations`
/// row, so a failed step leaves the previous version intact.
pub fn run(conn: &mut Connection) -> Result<(), Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )?;

    let current = schema_version(conn)?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
        tx.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        tracing::debug!(version = migration.version, name = migration.name, "applied migration");
    }

    Ok(())
}
