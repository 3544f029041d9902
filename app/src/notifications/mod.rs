//! Notification platform interface
//!
//! The scheduling services only talk to the platform through
//! [`NotificationPlatform`]. Two implementations ship with the crate:
//! - `LocalNotifier`: in-process delivery driven by tokio-cron-scheduler
//! - `MemoryPlatform`: records every call, used by tests and embedders

pub mod local;
pub mod memory;

pub use local::LocalNotifier;
pub use memory::MemoryPlatform;

use crate::error::PlatformError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

// ===== Categories and action buttons =====

pub const CATEGORY_ACTION_REMINDER: &str = "action_reminder";
pub const CATEGORY_LIST_REMINDER: &str = "list_reminder";
pub const CATEGORY_SNOOZE: &str = "snooze";

pub const SNOOZE_10M: &str = "SNOOZE_10M";
pub const SNOOZE_1H: &str = "SNOOZE_1H";
pub const SNOOZE_MORE: &str = "SNOOZE_MORE";

/// Free-form payload attached to a notification
pub type NotificationData = serde_json::Map<String, serde_json::Value>;

/// Opaque identifier the platform returns for a scheduled notification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(pub String);

impl NotificationHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NotificationHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub category: Option<String>,
    #[serde(default)]
    pub data: NotificationData,
}

/// When a notification fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// Once, at an absolute instant
    Date { at: DateTime<Utc> },
    /// Every day at a local wall-clock time
    Daily { hour: u32, minute: u32 },
    /// Every week; `weekday` uses 1 = Sunday .. 7 = Saturday
    Weekly { weekday: u32, hour: u32, minute: u32 },
    /// Every month on `day`
    Monthly { day: u32, hour: u32, minute: u32 },
}

impl Trigger {
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Trigger::Date { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    pub granted: bool,
    pub can_ask_again: bool,
}

impl PermissionStatus {
    pub const GRANTED: PermissionStatus = PermissionStatus {
        granted: true,
        can_ask_again: true,
    };

    pub const DENIED: PermissionStatus = PermissionStatus {
        granted: false,
        can_ask_again: false,
    };
}

/// A button shown on notifications of a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub identifier: String,
    pub button_title: String,
    pub opens_app: bool,
}

/// The user's interaction with a presented notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub notification_id: NotificationHandle,
    pub action_identifier: String,
    pub content: NotificationContent,
    pub trigger: Option<Trigger>,
}

impl NotificationResponse {
    /// Idempotency key: the same button on the same notification
    pub fn response_key(&self) -> String {
        format!("{}:{}", self.notification_id, self.action_identifier)
    }
}

#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus, PlatformError>;

    async fn request_permission(&self) -> Result<PermissionStatus, PlatformError>;

    async fn set_category(
        &self,
        identifier: &str,
        actions: Vec<NotificationAction>,
    ) -> Result<(), PlatformError>;

    async fn schedule(
        &self,
        content: NotificationContent,
        trigger: Trigger,
    ) -> Result<NotificationHandle, PlatformError>;

    async fn cancel_scheduled(&self, handle: &NotificationHandle) -> Result<(), PlatformError>;

    /// Remove an already presented notification
    async fn dismiss(&self, handle: &NotificationHandle) -> Result<(), PlatformError>;

    async fn last_response(&self) -> Result<Option<NotificationResponse>, PlatformError>;

    async fn clear_last_response(&self) -> Result<(), PlatformError>;

    /// Watch the single "last response" slot
    fn subscribe_responses(&self) -> watch::Receiver<Option<NotificationResponse>>;
}

/// Check notification permission, asking once more when allowed to.
///
/// `Ok(false)` means permanently denied; callers treat it as "skip".
pub async fn ensure_permission(platform: &dyn NotificationPlatform) -> Result<bool, PlatformError> {
    let current = platform.permission_status().await?;
    if current.granted {
        return Ok(true);
    }

    if !current.can_ask_again {
        return Ok(false);
    }

    Ok(platform.request_permission().await?.granted)
}

/// The three snooze buttons shared by every category
pub fn snooze_actions() -> Vec<NotificationAction> {
    vec![
        NotificationAction {
            identifier: SNOOZE_10M.to_string(),
            button_title: "10 min".to_string(),
            opens_app: false,
        },
        NotificationAction {
            identifier: SNOOZE_1H.to_string(),
            button_title: "1 hour".to_string(),
            opens_app: false,
        },
        NotificationAction {
            identifier: SNOOZE_MORE.to_string(),
            button_title: "More…".to_string(),
            opens_app: true,
        },
    ]
}

/// Register the notification categories so every notification carries the
/// snooze buttons. Called once during bootstrap.
pub async fn setup_categories(platform: &dyn NotificationPlatform) -> Result<(), PlatformError> {
    for category in [CATEGORY_ACTION_REMINDER, CATEGORY_LIST_REMINDER, CATEGORY_SNOOZE] {
        platform.set_category(category, snooze_actions()).await?;
    }

    tracing::debug!("Notification categories registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_permission_paths() {
        let granted = MemoryPlatform::new();
        assert!(ensure_permission(&granted).await.unwrap());

        let denied = MemoryPlatform::with_permission(PermissionStatus::DENIED, false);
        assert!(!ensure_permission(&denied).await.unwrap());
        assert_eq!(denied.permission_requests().await, 0);

        let askable = MemoryPlatform::with_permission(
            PermissionStatus {
                granted: false,
                can_ask_again: true,
            },
            true,
        );
        assert!(ensure_permission(&askable).await.unwrap());
        assert_eq!(askable.permission_requests().await, 1);
    }

    #[tokio::test]
    async fn test_setup_categories() {
        let platform = MemoryPlatform::new();

        setup_categories(&platform).await.unwrap();

        let categories = platform.categories().await;
        assert_eq!(categories.len(), 3);
        let snooze = &categories[CATEGORY_SNOOZE];
        let ids: Vec<_> = snooze.iter().map(|a| a.identifier.as_str()).collect();
        assert_eq!(ids, vec![SNOOZE_10M, SNOOZE_1H, SNOOZE_MORE]);
        assert!(snooze[2].opens_app);
    }

    #[test]
    fn test_response_key() {
        let response = NotificationResponse {
            notification_id: NotificationHandle("abc".to_string()),
            action_identifier: SNOOZE_10M.to_string(),
            content: NotificationContent::default(),
            trigger: None,
        };

        assert_eq!(response.response_key(), "abc:SNOOZE_10M");
    }
}
