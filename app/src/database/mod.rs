//! Database module
//!
//! This module provides all database functionality including:
//! - Schema and migrations
//! - Model definitions
//! - Repository layer for CRUD operations
//! - The `Store` holder that opens the database exactly once

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
        },
    )
}

/// Create and initialize a database connection pool.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every pooled connection
/// sees the final schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}

/// Owner of the application's single repository instance.
///
/// Components receive an `Arc<Store>` and either open it or check whether
/// it is ready. Concurrent `open` calls wait on the same initialization;
/// a failed initialization leaves the store closed so it can be retried.
pub struct Store {
    db_path: PathBuf,
    repo: OnceCell<Repository>,
}

impl Store {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            repo: OnceCell::new(),
        }
    }

    /// Wrap an already initialized repository (tests, embedding)
    pub fn with_repository(repo: Repository) -> Self {
        Self {
            db_path: PathBuf::new(),
            repo: OnceCell::new_with(Some(repo)),
        }
    }

    /// Open the database, running migrations on first use
    pub async fn open(&self) -> Result<Repository> {
        let repo = self
            .repo
            .get_or_try_init(|| async {
                let pool = create_pool(&self.db_path).await?;
                Ok::<_, crate::error::AppError>(Repository::new(pool))
            })
            .await?;

        Ok(repo.clone())
    }

    /// Repository if the store has finished opening
    pub fn get(&self) -> Option<Repository> {
        self.repo.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.repo.initialized()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
