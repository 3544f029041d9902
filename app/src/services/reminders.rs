//! Action reminders service
//!
//! Turns an action's reminder into at most one platform trigger and keeps
//! `notification_meta[action_<id>]` pointing at the live handle.

use super::registry::{action_key, NotificationRegistry, PAYLOAD_ACTION_REMINDER};
use crate::config::ACTION_REMINDER_TITLE;
use crate::database::repository::now_ms;
use crate::database::{Action, Reminder};
use crate::error::ReminderError;
use crate::notifications::{
    ensure_permission, NotificationContent, NotificationData, NotificationHandle, Trigger,
    CATEGORY_ACTION_REMINDER,
};
use chrono::DateTime;
use serde_json::json;

/// Result of a scheduling attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(NotificationHandle),
    Skipped(SkipReason),
}

impl ScheduleOutcome {
    pub fn handle(&self) -> Option<&NotificationHandle> {
        match self {
            ScheduleOutcome::Scheduled(handle) => Some(handle),
            ScheduleOutcome::Skipped(_) => None,
        }
    }
}

/// Why nothing was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoReminder,
    Done,
    PermissionDenied,
    /// The reminder cannot be expressed as a trigger
    InvalidReminder,
}

/// Platform trigger for a reminder. `None` for `Reminder::None` and for
/// instants chrono cannot represent.
pub fn trigger_for(reminder: &Reminder) -> Option<Trigger> {
    match *reminder {
        Reminder::None => None,
        Reminder::Once { at } => DateTime::from_timestamp_millis(at).map(|at| Trigger::Date { at }),
        Reminder::Daily { time } => Some(Trigger::Daily {
            hour: time.hour,
            minute: time.minute,
        }),
        Reminder::Weekly { time, weekday } => Some(Trigger::Weekly {
            weekday: weekday.number_from_sunday(),
            hour: time.hour,
            minute: time.minute,
        }),
        Reminder::Monthly { time, monthday } => Some(Trigger::Monthly {
            day: monthday,
            hour: time.hour,
            minute: time.minute,
        }),
    }
}

/// Notification shown for an action reminder
pub fn action_content(action: &Action) -> NotificationContent {
    let mut data = NotificationData::new();
    data.insert("type".to_string(), json!(PAYLOAD_ACTION_REMINDER));
    data.insert("actionId".to_string(), json!(action.id));

    NotificationContent {
        title: ACTION_REMINDER_TITLE.to_string(),
        body: action.title.clone(),
        category: Some(CATEGORY_ACTION_REMINDER.to_string()),
        data,
    }
}

#[derive(Clone)]
pub struct ReminderService {
    registry: NotificationRegistry,
}

impl ReminderService {
    pub fn new(registry: NotificationRegistry) -> Self {
        Self { registry }
    }

    /// Schedule the action's reminder.
    ///
    /// Actions without a reminder, done actions and a denied permission are
    /// skips, not errors.
    pub async fn schedule(&self, action: &Action) -> Result<ScheduleOutcome, ReminderError> {
        if action.reminder.is_none() {
            return Ok(ScheduleOutcome::Skipped(SkipReason::NoReminder));
        }
        if action.is_done {
            return Ok(ScheduleOutcome::Skipped(SkipReason::Done));
        }

        let Some(trigger) = trigger_for(&action.reminder) else {
            tracing::debug!("Action {} has an unschedulable reminder", action.id);
            return Ok(ScheduleOutcome::Skipped(SkipReason::InvalidReminder));
        };

        if !ensure_permission(self.registry.platform()).await? {
            tracing::debug!("Notification permission denied, skipping action {}", action.id);
            return Ok(ScheduleOutcome::Skipped(SkipReason::PermissionDenied));
        }

        let handle = self
            .registry
            .schedule(&action_key(action.id), action_content(action), trigger)
            .await?;

        tracing::info!(
            "Scheduled {} reminder for action {}",
            action.reminder.kind().as_str(),
            action.id
        );
        Ok(ScheduleOutcome::Scheduled(handle))
    }

    /// Cancel the action's live reminder, if any
    pub async fn cancel(&self, action_id: i64) -> Result<bool, ReminderError> {
        self.registry.cancel(&action_key(action_id)).await
    }

    /// Cancel, then schedule again
    pub async fn reschedule(&self, action: &Action) -> Result<ScheduleOutcome, ReminderError> {
        self.cancel(action.id).await?;
        self.schedule(action).await
    }

    /// Re-issue the reminder of every active action.
    ///
    /// Recorded handles may belong to a platform that no longer exists
    /// (the process restarted), so each one is replaced. A one-time
    /// reminder whose instant has passed only loses its mapping. Failures
    /// for single actions are logged. Returns how many were scheduled.
    pub async fn restore_all(&self) -> Result<usize, ReminderError> {
        let now = now_ms();
        let mut restored = 0;

        for action in self.registry.repository().list_active().await? {
            if action.reminder.is_none() {
                continue;
            }

            if let Reminder::Once { at } = action.reminder {
                if at <= now {
                    self.cancel(action.id).await?;
                    continue;
                }
            }

            match self.reschedule(&action).await {
                Ok(ScheduleOutcome::Scheduled(_)) => restored += 1,
                Ok(ScheduleOutcome::Skipped(reason)) => {
                    tracing::debug!("Not restoring reminder for action {}: {:?}", action.id, reason)
                }
                Err(e) => tracing::warn!("Failed to restore reminder for action {}: {}", action.id, e),
            }
        }

        tracing::info!("Restored {} action reminders", restored);
        Ok(restored)
    }
}
