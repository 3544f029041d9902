//! Settings service
//!
//! Reads and writes the string-keyed settings table: the reminder time of
//! each list and the notification debug feedback toggle.

use super::digest::ListDigestService;
use crate::database::{ActionList, Repository, Setting, SettingsKey, TimeOfDay};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Stored value that turns debug feedback on
const FLAG_ON: &str = "1";
const FLAG_OFF: &str = "0";

/// Snapshot of every setting, as shown on the settings screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub perso_reminder_time: TimeOfDay,
    pub pro_reminder_time: TimeOfDay,
    pub notification_action_debug_feedback: bool,
}

/// Reminder time of a list, falling back to the list default when unset
pub async fn list_reminder_time(repo: &Repository, list: ActionList) -> Result<TimeOfDay> {
    let value = repo.get_setting(list.reminder_time_key().as_str()).await?;
    let raw = value.as_deref().unwrap_or_else(|| list.default_reminder_time());

    Ok(TimeOfDay::parse_lenient(raw))
}

/// Whether snooze feedback messages are enabled. Read failures count as off.
pub async fn debug_feedback_enabled(repo: &Repository) -> bool {
    match repo
        .get_setting(SettingsKey::NotificationActionDebugFeedback.as_str())
        .await
    {
        Ok(value) => value.as_deref() == Some(FLAG_ON),
        Err(e) => {
            tracing::warn!("Failed to read debug feedback setting: {}", e);
            false
        }
    }
}

#[derive(Clone)]
pub struct SettingsService {
    repo: Repository,
    digest: ListDigestService,
}

impl SettingsService {
    pub fn new(repo: Repository, digest: ListDigestService) -> Self {
        Self { repo, digest }
    }

    pub async fn get(&self) -> Result<AppSettings> {
        Ok(AppSettings {
            perso_reminder_time: self.reminder_time(ActionList::Perso).await?,
            pro_reminder_time: self.reminder_time(ActionList::Pro).await?,
            notification_action_debug_feedback: self.debug_feedback_enabled().await,
        })
    }

    /// Raw key/value rows
    pub async fn list(&self) -> Result<Vec<Setting>> {
        self.repo.list_settings().await
    }

    pub async fn reminder_time(&self, list: ActionList) -> Result<TimeOfDay> {
        list_reminder_time(&self.repo, list).await
    }

    /// Store a new "HH:MM" reminder time for `list` and re-issue its digest.
    ///
    /// The digest update is best effort; only validation and storage errors
    /// are returned.
    pub async fn set_reminder_time(&self, list: ActionList, value: &str) -> Result<TimeOfDay> {
        let time = TimeOfDay::parse_strict(value.trim()).ok_or_else(|| {
            AppError::Validation(format!("Reminder time must be HH:MM, got '{}'", value))
        })?;

        self.repo
            .set_setting(list.reminder_time_key().as_str(), &time.to_string())
            .await?;

        tracing::info!("{} reminder time set to {}", list.display_name(), time);

        if let Err(e) = self.digest.schedule(list, time).await {
            tracing::warn!("Failed to reschedule {} digest: {}", list, e);
        }

        Ok(time)
    }

    pub async fn debug_feedback_enabled(&self) -> bool {
        debug_feedback_enabled(&self.repo).await
    }

    pub async fn set_debug_feedback(&self, enabled: bool) -> Result<()> {
        let value = if enabled { FLAG_ON } else { FLAG_OFF };
        self.repo
            .set_setting(SettingsKey::NotificationActionDebugFeedback.as_str(), value)
            .await?;

        tracing::debug!("Notification debug feedback: {}", enabled);
        Ok(())
    }
}
