pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("001_users", include_str!("../../migrations/001_users.sql")),
    ("002_posts", include_str!("../../migrations/002_posts.sql")),
    (
        "003_post_interactions",
        include_str!("../../migrations/003_post_interactions.sql"),
    ),
];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas; foreign keys are off by default in SQLite.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Round-trip latency of a trivial query, used by the health check.
pub fn ping(pool: &DbPool) -> anyhow::Result<std::time::Duration> {
    let started = std::time::Instant::now();
    let conn = pool.get()?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(started.elapsed())
}

/// Migrated database in a temp dir. Keep the `TempDir` alive for the test.
#[cfg(test)]
pub(crate) fn test_pool() -> (tempfile::TempDir, DbPool) {
    let tmp = tempfile::tempdir().unwrap();
    let pool = create_pool(&tmp.path().join("test.db")).unwrap();
    run_migrations(&pool).unwrap();
    (tmp, pool)
}

/// Inserts a user with a throwaway password hash and returns its id.
#[cfg(test)]
pub(crate) fn seed_user(pool: &DbPool, username: &str) -> String {
    let conn = pool.get().unwrap();
    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now();
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, display_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'x', ?2, ?4, ?4)",
        params![id, username, format!("{username}@example.com"), now],
    )
    .unwrap();
    id
}
