//! Application configuration constants
//!
//! Central location for ordering, reminder and snooze constants, plus the
//! small environment-driven runtime configuration used by the binary.

use std::path::PathBuf;

// ===== Ordering =====

/// Distance between neighbouring sort indexes after placement or rebalance.
pub const SORT_GAP: i64 = 1000;

// ===== List digests =====

/// Number of task titles previewed in a list digest notification
pub const DIGEST_PREVIEW_LIMIT: i64 = 3;

/// Default digest time for the Perso list
pub const DEFAULT_PERSO_REMINDER_TIME: &str = "08:00";

/// Default digest time for the Pro list
pub const DEFAULT_PRO_REMINDER_TIME: &str = "13:00";

// ===== Action reminders =====

/// Title shown on every per-action reminder
pub const ACTION_REMINDER_TITLE: &str = "Reminder";

// ===== Snooze presets (milliseconds) =====

pub const SNOOZE_TEN_MINUTES_MS: i64 = 10 * 60 * 1000;
pub const SNOOZE_ONE_HOUR_MS: i64 = 60 * 60 * 1000;
pub const SNOOZE_ONE_DAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const SNOOZE_ONE_WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

// ===== Storage =====

/// Database file name inside the data directory
pub const DATABASE_FILE_NAME: &str = "tasklists.db";

/// Environment variable overriding the full database path
pub const ENV_DB_PATH: &str = "TASKLISTS_DB_PATH";

/// Environment variable overriding the data directory
pub const ENV_DATA_DIR: &str = "TASKLISTS_DATA_DIR";

/// Runtime configuration resolved at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
}

impl AppConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Resolve configuration from the environment.
    ///
    /// `TASKLISTS_DB_PATH` wins; otherwise the database lives in
    /// `TASKLISTS_DATA_DIR` (default `./data`).
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            if !path.trim().is_empty() {
                return Self::new(path);
            }
        }

        let data_dir = std::env::var(ENV_DATA_DIR)
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        Self::new(data_dir.join(DATABASE_FILE_NAME))
    }
}
