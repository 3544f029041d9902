//! List digest service
//!
//! One summary notification per list ("3 tasks remaining" plus a preview of
//! the first titles). Each digest is a one-shot notification for the next
//! occurrence of the list's reminder time and is re-issued by `refresh`
//! whenever the list's membership or reminder time changes.

use super::registry::{list_key, NotificationRegistry, PAYLOAD_LIST_REMINDER};
use super::reminders::{ScheduleOutcome, SkipReason};
use super::settings::list_reminder_time;
use crate::config::DIGEST_PREVIEW_LIMIT;
use crate::database::{ActionList, Repository, TimeOfDay};
use crate::error::ReminderError;
use crate::notifications::{
    ensure_permission, NotificationContent, NotificationData, NotificationHandle, Trigger,
    CATEGORY_LIST_REMINDER,
};
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone, Utc};
use serde_json::json;

/// Digest body: count line, numbered previews, and an overflow line
pub fn digest_body(count: i64, titles: &[String]) -> String {
    let label = if count == 1 { "task" } else { "tasks" };
    let mut body = format!("{} {} remaining", count, label);

    if count > 0 {
        for (index, title) in titles.iter().enumerate() {
            body.push_str(&format!("\n{}. {}", index + 1, title));
        }

        if count > DIGEST_PREVIEW_LIMIT {
            body.push_str(&format!("\n…and {} more", count - DIGEST_PREVIEW_LIMIT));
        }
    }

    body
}

/// First instant strictly after `now` whose wall-clock time is `time`.
///
/// Skips local times that do not exist on a given day.
pub fn next_occurrence<Tz: TimeZone>(time: TimeOfDay, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let at = NaiveTime::from_hms_opt(time.hour, time.minute, 0)?;
    let today = now.date_naive();
    let tz = now.timezone();

    (0..=2)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|day| tz.from_local_datetime(&day.and_time(at)).earliest())
        .find(|candidate| candidate > now)
}

#[derive(Clone)]
pub struct ListDigestService {
    repo: Repository,
    registry: NotificationRegistry,
}

impl ListDigestService {
    pub fn new(registry: NotificationRegistry) -> Self {
        Self {
            repo: registry.repository().clone(),
            registry,
        }
    }

    /// Re-issue the digest of every list
    pub async fn refresh(&self) -> Result<(), ReminderError> {
        if !ensure_permission(self.registry.platform()).await? {
            tracing::debug!("Notification permission denied, skipping digests");
            return Ok(());
        }

        for list in ActionList::ALL {
            self.cancel(list).await?;
            let time = list_reminder_time(&self.repo, list).await?;
            self.schedule_with_permission(list, time).await?;
        }

        tracing::debug!("List digests refreshed");
        Ok(())
    }

    /// Schedule the digest of `list` for the next `time`, replacing any
    /// live one.
    pub async fn schedule(&self, list: ActionList, time: TimeOfDay) -> Result<ScheduleOutcome, ReminderError> {
        if !ensure_permission(self.registry.platform()).await? {
            return Ok(ScheduleOutcome::Skipped(SkipReason::PermissionDenied));
        }

        let handle = self.schedule_with_permission(list, time).await?;
        Ok(ScheduleOutcome::Scheduled(handle))
    }

    pub async fn cancel(&self, list: ActionList) -> Result<bool, ReminderError> {
        self.registry.cancel(&list_key(list)).await
    }

    /// Content of the digest as it would be sent now
    pub async fn content(&self, list: ActionList) -> Result<NotificationContent, ReminderError> {
        let count = self.repo.count_active_in_list(list).await?;
        let titles: Vec<String> = if count > 0 {
            self.repo
                .top_active_in_list(list, DIGEST_PREVIEW_LIMIT)
                .await?
                .into_iter()
                .map(|action| action.title)
                .collect()
        } else {
            Vec::new()
        };

        let mut data = NotificationData::new();
        data.insert("type".to_string(), json!(PAYLOAD_LIST_REMINDER));
        data.insert("list".to_string(), json!(list.as_str()));

        Ok(NotificationContent {
            title: list.display_name().to_string(),
            body: digest_body(count, &titles),
            category: Some(CATEGORY_LIST_REMINDER.to_string()),
            data,
        })
    }

    async fn schedule_with_permission(
        &self,
        list: ActionList,
        time: TimeOfDay,
    ) -> Result<NotificationHandle, ReminderError> {
        let at = next_occurrence(time, &Local::now())
            .ok_or_else(|| ReminderError::Store(format!("No next occurrence of {}", time)))?;

        let content = self.content(list).await?;
        let handle = self
            .registry
            .schedule(
                &list_key(list),
                content,
                Trigger::Date {
                    at: at.with_timezone(&Utc),
                },
            )
            .await?;

        tracing::info!("Scheduled {} digest for {}", list, at);
        Ok(handle)
    }
}
