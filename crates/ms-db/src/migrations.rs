//! Versioned schema migrations.
//!
//! Each migration is an SQL batch applied once, in version order, inside its
//! own transaction. Applied versions are recorded in `schema_migrations`.

use std::collections::HashSet;

use ms_core::{Error, Result};
use rusqlite::Connection;

/// V1: media table with technical metadata columns.
const V1_INITIAL: &str = r#"
CREATE TABLE media (
    id              TEXT PRIMARY KEY,
    path            TEXT NOT NULL UNIQUE,
    file_name       TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'available',
    metadata_status TEXT NOT NULL DEFAULT 'pending',
    duration        REAL,
    width           INTEGER,
    height          INTEGER,
    fps             REAL,
    codec           TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX idx_media_status ON media(status);
"#;

/// V2: generation parameters blob and an index serving the pending-batch query.
const V2_GENERATION_PARAMS: &str = r#"
ALTER TABLE media ADD COLUMN generation_params TEXT;
CREATE INDEX idx_media_metadata_status ON media(metadata_status, created_at);
"#;

/// V3: the pending-batch query also filters on availability.
const V3_PENDING_AVAILABLE_INDEX: &str = r#"
CREATE INDEX idx_media_pending_available ON media(created_at)
    WHERE metadata_status = 'pending' AND status = 'available';
"#;

const MIGRATIONS: &[(i64, &str)] = &[
    (1, V1_INITIAL),
    (2, V2_GENERATION_PARAMS),
    (3, V3_PENDING_AVAILABLE_INDEX),
];

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e)
}

fn applied_versions(conn: &Connection) -> Result<HashSet<i64>> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(db_err)?;

    let mut stmt = conn
        .prepare("SELECT version FROM schema_migrations")
        .map_err(db_err)?;
    let versions = stmt
        .query_map([], |row| row.get(0))
        .map_err(db_err)?
        .collect::<rusqlite::Result<HashSet<i64>>>()
        .map_err(db_err)?;
    Ok(versions)
}

fn apply(conn: &Connection, version: i64, sql: &str) -> Result<()> {
    let tx = conn.unchecked_transaction().map_err(db_err)?;
    tx.execute_batch(sql)
        .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;
    tx.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])
        .map_err(db_err)?;
    tx.commit().map_err(db_err)
}

/// Bring the schema on `conn` up to date. Safe to call on every start.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let applied = applied_versions(conn)?;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| !applied.contains(v)) {
        apply(conn, version, sql)?;
        tracing::debug!(version, "Applied migration");
    }

    Ok(())
}
