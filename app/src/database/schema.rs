//! Database schema and migrations
//!
//! This module handles database initialization and schema migrations.
//! Uses SQLite with WAL mode for crash safety.

use crate::error::Result;
use sqlx::{sqlite::SqlitePool, Row};

/// Schema migrations, in the order they apply. Versions never change once
/// shipped; new tables or columns get a new entry.
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("migrations/001_initial_schema.sql"))];

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    // WAL keeps readers working while a reorder transaction commits
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // Bookkeeping table, one row per applied version
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version = schema_version(pool).await?;
    tracing::info!("Current database version: {}", current_version);

    let applied = apply_migrations(pool, current_version).await?;
    if applied > 0 {
        tracing::info!("Applied {} migration(s)", applied);
    }

    tracing::info!("Database initialization complete");
    Ok(())
}

/// Highest applied migration version, 0 for a fresh file
async fn schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    Ok(version)
}

async fn apply_migrations(pool: &SqlitePool, current_version: i32) -> Result<usize> {
    let mut applied = 0;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current_version) {
        tracing::info!("Applying migration version {}", version);

        // A failing statement rolls back the whole version
        let mut tx = pool.begin().await?;

        for statement in split_statements(sql) {
            sqlx::query(statement.as_str()).execute(&mut *tx).await?;
        }

        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        applied += 1;

        tracing::info!("Migration version {} applied successfully", version);
    }

    Ok(applied)
}

/// Split a migration script into statements, dropping `--` comment lines.
/// Scripts must not put `;` inside string literals.
fn split_statements(sql: &str) -> Vec<String> {
    let code: String = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    code.split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn test_split_statements_skips_comments() {
        let sql = "-- settings table\nCREATE TABLE a (x TEXT);\n\n-- seed; with a semicolon\nINSERT INTO a VALUES ('1');\n";

        assert_eq!(
            split_statements(sql),
            vec!["CREATE TABLE a (x TEXT)", "INSERT INTO a VALUES ('1')"]
        );
        assert!(split_statements("  ;\n-- nothing\n").is_empty());
    }

    #[test]
    fn test_migration_versions_increase() {
        assert!(MIGRATIONS.windows(2).all(|pair| pair[0].0 < pair[1].0));
        assert_eq!(MIGRATIONS[0].0, 1);
    }

    #[tokio::test]
    async fn test_initialize_database() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, 1);

        for table in ["actions", "settings", "notification_meta"] {
            let count: i32 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_default_settings_seeded() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let perso: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'perso_reminder_time'")
            .fetch_one(&pool)
            .await
            .unwrap();
        let pro: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'pro_reminder_time'")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(perso, "08:00");
        assert_eq!(pro, "13:00");
    }

    #[tokio::test]
    async fn test_initialize_twice_keeps_user_settings() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();
        sqlx::query("UPDATE settings SET value = '06:30' WHERE key = 'perso_reminder_time'")
            .execute(&pool)
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let perso: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'perso_reminder_time'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(perso, "06:30");

        let applied: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, 1);
    }
}
