//! Notification registry
//!
//! Maps logical reminder keys (`action_<id>`, `list_<list>`) to the platform
//! handle that currently represents them, and keeps the `notification_meta`
//! table and the platform schedule in step: a key never points at more than
//! one live notification.

use crate::database::{ActionList, Repository};
use crate::error::ReminderError;
use crate::notifications::{NotificationContent, NotificationHandle, NotificationPlatform, Trigger};
use std::sync::Arc;

/// Payload `type` of per-action reminders
pub const PAYLOAD_ACTION_REMINDER: &str = "action_reminder";
/// Payload `type` of list digests
pub const PAYLOAD_LIST_REMINDER: &str = "list_reminder";

pub fn action_key(action_id: i64) -> String {
    format!("action_{}", action_id)
}

pub fn list_key(list: ActionList) -> String {
    format!("list_{}", list.as_str())
}

#[derive(Clone)]
pub struct NotificationRegistry {
    repo: Repository,
    platform: Arc<dyn NotificationPlatform>,
}

impl NotificationRegistry {
    pub fn new(repo: Repository, platform: Arc<dyn NotificationPlatform>) -> Self {
        Self { repo, platform }
    }

    pub fn platform(&self) -> &dyn NotificationPlatform {
        self.platform.as_ref()
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Handle currently recorded for `key`
    pub async fn handle_for(&self, key: &str) -> Result<Option<NotificationHandle>, ReminderError> {
        Ok(self
            .repo
            .get_notification_id(key)
            .await?
            .map(NotificationHandle))
    }

    /// Schedule a notification and make it the live one for `key`
    pub async fn schedule(
        &self,
        key: &str,
        content: NotificationContent,
        trigger: Trigger,
    ) -> Result<NotificationHandle, ReminderError> {
        let handle = self.platform.schedule(content, trigger).await?;
        self.record_or_withdraw(key, &handle).await?;

        tracing::debug!("Scheduled {} as notification {}", key, handle);
        Ok(handle)
    }

    /// Point `key` at a snoozed copy of `source`.
    ///
    /// The key only moves while it still points at `source` or at nothing.
    /// If it already points elsewhere (the next digest was issued after
    /// `source` fired) that notification stays live and the copy is left
    /// unrecorded. Returns whether the key now points at `handle`.
    pub async fn adopt_snoozed(
        &self,
        key: &str,
        handle: &NotificationHandle,
        source: Option<&NotificationHandle>,
    ) -> Result<bool, ReminderError> {
        let current = match self.handle_for(key).await {
            Ok(current) => current,
            Err(e) => {
                self.withdraw(handle).await;
                return Err(e);
            }
        };

        if let Some(current) = current {
            if Some(&current) != source {
                tracing::debug!("Keeping {} on notification {}, not the snoozed copy", key, current);
                return Ok(false);
            }
        }

        self.record_or_withdraw(key, handle).await?;
        Ok(true)
    }

    /// Record `handle` for `key`, cancelling it again if the mapping cannot
    /// be written so no notification is live without one.
    async fn record_or_withdraw(&self, key: &str, handle: &NotificationHandle) -> Result<(), ReminderError> {
        if let Err(e) = self.record(key, handle).await {
            tracing::warn!("Failed to record notification {} for {}: {}", handle, key, e);
            self.withdraw(handle).await;
            return Err(e);
        }
        Ok(())
    }

    async fn withdraw(&self, handle: &NotificationHandle) {
        if let Err(e) = self.platform.cancel_scheduled(handle).await {
            tracing::warn!("Failed to withdraw unrecorded notification {}: {}", handle, e);
        }
    }

    /// Point `key` at `handle`.
    ///
    /// A different handle still recorded for the key is cancelled first so
    /// it cannot keep firing unreferenced.
    pub async fn record(&self, key: &str, handle: &NotificationHandle) -> Result<(), ReminderError> {
        if let Some(previous) = self.handle_for(key).await? {
            if &previous != handle {
                tracing::warn!("Replacing live notification {} for {}", previous, key);
                if let Err(e) = self.platform.cancel_scheduled(&previous).await {
                    tracing::debug!("Previous notification {} already gone: {}", previous, e);
                }
            }
        }

        self.repo.set_notification_id(key, handle.as_str()).await?;
        Ok(())
    }

    /// Cancel the live notification for `key` and forget the mapping.
    ///
    /// The mapping is removed even when the platform no longer knows the
    /// handle. Returns whether a mapping existed.
    pub async fn cancel(&self, key: &str) -> Result<bool, ReminderError> {
        let Some(handle) = self.handle_for(key).await? else {
            return Ok(false);
        };

        if let Err(e) = self.platform.cancel_scheduled(&handle).await {
            tracing::debug!("Ignoring stale notification {} for {}: {}", handle, key, e);
        }

        self.repo.delete_notification_meta(key).await?;

        tracing::debug!("Cancelled {} (notification {})", key, handle);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::create_test_repo;
    use crate::notifications::MemoryPlatform;

    fn content() -> NotificationContent {
        NotificationContent {
            title: "t".to_string(),
            body: "b".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_keys() {
        assert_eq!(action_key(7), "action_7");
        assert_eq!(list_key(ActionList::Pro), "list_pro");
        assert_eq!(list_key(ActionList::Perso), "list_perso");
    }

    #[tokio::test]
    async fn test_schedule_replaces_live_handle() {
        let platform = Arc::new(MemoryPlatform::new());
        let registry = NotificationRegistry::new(create_test_repo().await, platform.clone());

        let first = registry
            .schedule("action_1", content(), Trigger::Daily { hour: 9, minute: 0 })
            .await
            .unwrap();
        let second = registry
            .schedule("action_1", content(), Trigger::Daily { hour: 10, minute: 0 })
            .await
            .unwrap();

        assert_eq!(platform.cancel_calls().await, vec![first]);
        let live = platform.scheduled().await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].handle, second);
        assert_eq!(registry.handle_for("action_1").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_schedule_withdraws_notification_when_mapping_fails() {
        let platform = Arc::new(MemoryPlatform::new());
        let repo = create_test_repo().await;
        let registry = NotificationRegistry::new(repo.clone(), platform.clone());

        repo.pool().close().await;

        let result = registry
            .schedule("action_1", content(), Trigger::Daily { hour: 9, minute: 0 })
            .await;
        assert!(matches!(result, Err(ReminderError::Database(_))));

        assert_eq!(platform.schedule_calls().await, 1);
        assert_eq!(platform.cancel_calls().await.len(), 1);
        assert!(platform.scheduled().await.is_empty());
    }

    #[tokio::test]
    async fn test_adopt_snoozed_follows_source_only() {
        let platform = Arc::new(MemoryPlatform::new());
        let registry = NotificationRegistry::new(create_test_repo().await, platform.clone());
        let once = || Trigger::Date { at: chrono::Utc::now() };

        let fired = registry.schedule("list_pro", content(), once()).await.unwrap();
        let copy = platform.schedule(content(), once()).await.unwrap();
        assert!(registry.adopt_snoozed("list_pro", &copy, Some(&fired)).await.unwrap());
        assert_eq!(registry.handle_for("list_pro").await.unwrap(), Some(copy.clone()));

        // A newer notification took the key; snoozing the copy leaves it alone
        let next = registry.schedule("list_pro", content(), once()).await.unwrap();
        let second_copy = platform.schedule(content(), once()).await.unwrap();
        assert!(!registry
            .adopt_snoozed("list_pro", &second_copy, Some(&copy))
            .await
            .unwrap());
        assert_eq!(registry.handle_for("list_pro").await.unwrap(), Some(next.clone()));
        assert!(platform.find(&next).await.is_some());
        assert!(platform.find(&second_copy).await.is_some());

        // Unmapped key
        let orphan = platform.schedule(content(), once()).await.unwrap();
        assert!(registry.adopt_snoozed("action_9", &orphan, None).await.unwrap());
        assert_eq!(registry.handle_for("action_9").await.unwrap(), Some(orphan));
    }

    #[tokio::test]
    async fn test_cancel_removes_mapping_even_when_stale() {
        let platform = Arc::new(MemoryPlatform::new());
        let repo = create_test_repo().await;
        let registry = NotificationRegistry::new(repo.clone(), platform.clone());

        repo.set_notification_id("list_pro", "gone").await.unwrap();

        assert!(registry.cancel("list_pro").await.unwrap());
        assert_eq!(repo.get_notification_id("list_pro").await.unwrap(), None);
        assert_eq!(platform.cancel_calls().await.len(), 1);

        assert!(!registry.cancel("list_pro").await.unwrap());
        assert_eq!(platform.cancel_calls().await.len(), 1);
    }
}
