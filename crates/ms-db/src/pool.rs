//! SQLite connection pooling.
//!
//! Both constructors run pending migrations before handing the pool out, so
//! callers always see the current schema.

use std::path::Path;

use ms_core::{Error, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const MAX_CONNECTIONS: u32 = 4;

/// Applied to every new on-disk connection. WAL lets the CLI read while the
/// harvester writes.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;";

fn build(manager: SqliteConnectionManager) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(MAX_CONNECTIONS)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to build connection pool: {e}")))?;
    migrations::run_migrations(&*get_conn(&pool)?)?;
    Ok(pool)
}

/// Open (or create) the library database at `db_path`.
///
/// Missing parent directories are created.
pub fn init_pool(db_path: &Path) -> Result<DbPool> {
    match db_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            std::fs::create_dir_all(dir)?;
            tracing::info!(dir = %dir.display(), "Created database directory");
        }
        _ => {}
    }

    let manager =
        SqliteConnectionManager::file(db_path).with_init(|conn| conn.execute_batch(FILE_PRAGMAS));
    build(manager)
}

/// A private in-memory database for tests.
///
/// Connections of one pool share a named shared-cache database; every call
/// gets a fresh name so pools never see each other's rows.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);

    let name = NEXT.fetch_add(1, Ordering::Relaxed);
    build(SqliteConnectionManager::file(format!(
        "file:ms_memdb_{name}?mode=memory&cache=shared"
    )))
}

pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("No database connection available: {e}")))
}
