//! Snooze service
//!
//! Schedules a one-shot copy of a notification later on. Copies use the
//! snooze category so they can be snoozed again, and a copy whose payload
//! carries a logical reminder key becomes the live notification for that
//! key.

use super::registry::{action_key, list_key, NotificationRegistry, PAYLOAD_ACTION_REMINDER, PAYLOAD_LIST_REMINDER};
use crate::config::{SNOOZE_ONE_DAY_MS, SNOOZE_ONE_HOUR_MS, SNOOZE_ONE_WEEK_MS, SNOOZE_TEN_MINUTES_MS};
use crate::database::ActionList;
use crate::error::ReminderError;
use crate::notifications::{
    NotificationContent, NotificationData, NotificationHandle, Trigger, CATEGORY_SNOOZE,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload field holding the logical key a snoozed copy stands for
pub const SNOOZE_META_KEY_FIELD: &str = "__snoozeMetaKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnoozePreset {
    TenMinutes,
    OneHour,
    OneDay,
    OneWeek,
}

impl SnoozePreset {
    pub const ALL: [SnoozePreset; 4] = [
        SnoozePreset::TenMinutes,
        SnoozePreset::OneHour,
        SnoozePreset::OneDay,
        SnoozePreset::OneWeek,
    ];

    pub fn duration(self) -> Duration {
        let ms = match self {
            SnoozePreset::TenMinutes => SNOOZE_TEN_MINUTES_MS,
            SnoozePreset::OneHour => SNOOZE_ONE_HOUR_MS,
            SnoozePreset::OneDay => SNOOZE_ONE_DAY_MS,
            SnoozePreset::OneWeek => SNOOZE_ONE_WEEK_MS,
        };
        Duration::milliseconds(ms)
    }

    /// Used in "Snoozed for ..." messages
    pub fn label(self) -> &'static str {
        match self {
            SnoozePreset::TenMinutes => "10 minutes",
            SnoozePreset::OneHour => "1 hour",
            SnoozePreset::OneDay => "1 day",
            SnoozePreset::OneWeek => "1 week",
        }
    }

    /// Used on buttons and in failure messages
    pub fn short_label(self) -> &'static str {
        match self {
            SnoozePreset::TenMinutes => "10 min",
            SnoozePreset::OneHour => "1 hour",
            SnoozePreset::OneDay => "1 day",
            SnoozePreset::OneWeek => "1 week",
        }
    }
}

/// Title, body and payload of the notification being snoozed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnoozeRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: NotificationData,
    /// Handle of the notification that fired, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<NotificationHandle>,
}

fn existing_meta_key(data: &NotificationData) -> Option<&str> {
    data.get(SNOOZE_META_KEY_FIELD)
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
}

fn payload_action_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let trimmed = s.trim_start();
            let end = trimmed
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map_or(trimmed.len(), |(i, _)| i);
            trimmed[..end].parse().ok()
        }
        _ => None,
    }
}

/// Logical reminder key a notification payload refers to
pub fn resolve_snooze_meta_key(data: &NotificationData) -> Option<String> {
    if let Some(key) = existing_meta_key(data) {
        return Some(key.to_string());
    }

    match data.get("type").and_then(Value::as_str) {
        Some(PAYLOAD_ACTION_REMINDER) => data
            .get("actionId")
            .and_then(payload_action_id)
            .map(action_key),
        Some(PAYLOAD_LIST_REMINDER) => data
            .get("list")
            .and_then(Value::as_str)
            .and_then(|list| list.parse::<ActionList>().ok())
            .map(list_key),
        _ => None,
    }
}

/// Payload for a snoozed copy.
///
/// Only copies of one-shot notifications are tagged with the logical key;
/// snoozing one firing of a recurring reminder leaves the series alone.
pub fn build_snooze_data(data: &NotificationData, trigger: Option<&Trigger>) -> NotificationData {
    if existing_meta_key(data).is_some() {
        return data.clone();
    }

    if !trigger.is_some_and(Trigger::is_one_shot) {
        return data.clone();
    }

    let mut tagged = data.clone();
    if let Some(key) = resolve_snooze_meta_key(data) {
        tagged.insert(SNOOZE_META_KEY_FIELD.to_string(), Value::String(key));
    }
    tagged
}

#[derive(Clone)]
pub struct SnoozeService {
    registry: NotificationRegistry,
}

impl SnoozeService {
    pub fn new(registry: NotificationRegistry) -> Self {
        Self { registry }
    }

    pub async fn snooze_preset(
        &self,
        request: &SnoozeRequest,
        preset: SnoozePreset,
    ) -> Result<NotificationHandle, ReminderError> {
        self.snooze_for(request, preset.duration()).await
    }

    /// Show the notification again after `delay`
    pub async fn snooze_for(
        &self,
        request: &SnoozeRequest,
        delay: Duration,
    ) -> Result<NotificationHandle, ReminderError> {
        self.schedule_at(request, Utc::now() + delay).await
    }

    /// Show the notification again at `at`, which must be in the future
    pub async fn snooze_until(
        &self,
        request: &SnoozeRequest,
        at: DateTime<Utc>,
    ) -> Result<NotificationHandle, ReminderError> {
        if at <= Utc::now() {
            return Err(ReminderError::InvalidSnoozeTime);
        }
        self.schedule_at(request, at).await
    }

    async fn schedule_at(
        &self,
        request: &SnoozeRequest,
        at: DateTime<Utc>,
    ) -> Result<NotificationHandle, ReminderError> {
        let content = NotificationContent {
            title: request.title.clone(),
            body: request.body.clone(),
            category: Some(CATEGORY_SNOOZE.to_string()),
            data: request.data.clone(),
        };

        let handle = self
            .registry
            .platform()
            .schedule(content, Trigger::Date { at })
            .await?;

        if let Some(key) = existing_meta_key(&request.data) {
            self.registry
                .adopt_snoozed(key, &handle, request.source.as_ref())
                .await?;
        }

        tracing::info!("Snoozed '{}' until {}", request.title, at);
        Ok(handle)
    }
}
