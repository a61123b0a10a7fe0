//! Database schema for the persistence store (§4.1).
//!
//! Schema is versioned: an append-only `schema_migrations` table records
//! the integer version of each applied migration. Startup applies pending
//! migrations in order, idempotently.

use sqlx::{Pool, Sqlite};
use tracing::info;

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            dedupe_key TEXT NOT NULL,
            source TEXT NOT NULL,
            payload TEXT NOT NULL,
            status TEXT NOT NULL,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    },
    Migration {
        version: 2,
        sql: r#"
        CREATE INDEX IF NOT EXISTS idx_jobs_dedupe_key ON jobs(dedupe_key);
        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
        "#,
    },
    Migration {
        version: 3,
        sql: r#"
        CREATE TABLE IF NOT EXISTS job_batch_checkpoints (
            job_id TEXT NOT NULL,
            batch_start INTEGER NOT NULL,
            batch_end INTEGER NOT NULL,
            texts TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (job_id, batch_start, batch_end)
        );
        "#,
    },
    Migration {
        version: 4,
        sql: r#"
        CREATE TABLE IF NOT EXISTS subtitle_cache (
            cache_key TEXT PRIMARY KEY,
            lines TEXT NOT NULL,
            language TEXT,
            format TEXT NOT NULL,
            path_hint TEXT,
            is_temp INTEGER NOT NULL DEFAULT 0,
            job_id TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_subtitle_cache_job_id ON subtitle_cache(job_id);
        "#,
    },
    Migration {
        version: 5,
        sql: r#"
        CREATE TABLE IF NOT EXISTS media_meta_cache (
            media_path TEXT NOT NULL,
            target_language TEXT NOT NULL,
            external_languages TEXT NOT NULL,
            embedded_languages TEXT NOT NULL,
            has_target_external INTEGER NOT NULL,
            has_target_embedded INTEGER NOT NULL,
            expires_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (media_path, target_language)
        );
        CREATE INDEX IF NOT EXISTS idx_media_meta_cache_expires ON media_meta_cache(expires_at);
        "#,
    },
];

/// Applies pending migrations in lexicographic (here: numeric) version
/// order. Idempotent — safe to call on every startup.
pub async fn initialize_schema(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version ASC")
        .fetch_all(pool)
        .await?;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        info!(version = migration.version, "applying schema migration");
        for statement in migration.sql.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement).execute(pool).await?;
            }
        }
        sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
            .bind(migration.version)
            .execute(pool)
            .await?;
    }

    info!("database schema up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn schema_initializes_and_is_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("pool");

        initialize_schema(&pool).await.expect("first init");
        initialize_schema(&pool).await.expect("second init must be idempotent");

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        for expected in ["jobs", "job_batch_checkpoints", "subtitle_cache", "media_meta_cache"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }
}
