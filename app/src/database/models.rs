//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization to a front-end.

use crate::config::{DEFAULT_PERSO_REMINDER_TIME, DEFAULT_PRO_REMINDER_TIME};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// The two user-facing task lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionList {
    Perso,
    Pro,
}

impl ActionList {
    pub const ALL: [ActionList; 2] = [ActionList::Perso, ActionList::Pro];

    /// Value stored in the `list` column and in notification payloads
    pub fn as_str(self) -> &'static str {
        match self {
            ActionList::Perso => "perso",
            ActionList::Pro => "pro",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ActionList::Perso => "Perso",
            ActionList::Pro => "Pro",
        }
    }

    /// Setting holding this list's digest time
    pub fn reminder_time_key(self) -> SettingsKey {
        match self {
            ActionList::Perso => SettingsKey::PersoReminderTime,
            ActionList::Pro => SettingsKey::ProReminderTime,
        }
    }

    pub fn default_reminder_time(self) -> &'static str {
        match self {
            ActionList::Perso => DEFAULT_PERSO_REMINDER_TIME,
            ActionList::Pro => DEFAULT_PRO_REMINDER_TIME,
        }
    }
}

impl fmt::Display for ActionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionList {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "perso" => Ok(ActionList::Perso),
            "pro" => Ok(ActionList::Pro),
            other => Err(format!("Unknown list: {}", other)),
        }
    }
}

/// Keys of the `settings` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsKey {
    PersoReminderTime,
    ProReminderTime,
    NotificationActionDebugFeedback,
}

impl SettingsKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingsKey::PersoReminderTime => "perso_reminder_time",
            SettingsKey::ProReminderTime => "pro_reminder_time",
            SettingsKey::NotificationActionDebugFeedback => "notification_action_debug_feedback",
        }
    }
}

/// A wall-clock time of day ("HH:MM", 24h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Parse an "HH:MM" value, never failing.
    ///
    /// Each component is read from its leading digits; anything unreadable
    /// becomes 0, and the result is clamped into a valid time.
    pub fn parse_lenient(value: &str) -> Self {
        let mut parts = value.split(':');
        let hour = parts.next().and_then(leading_number).unwrap_or(0);
        let minute = parts.next().and_then(leading_number).unwrap_or(0);

        Self {
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }

    /// Parse a strict "HH:MM" value as entered in settings
    pub fn parse_strict(value: &str) -> Option<Self> {
        let (hour, minute) = value.split_once(':')?;
        if hour.len() != 2 || minute.len() != 2 {
            return None;
        }
        if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::new(hour.parse().ok()?, minute.parse().ok()?)
    }
}

fn leading_number(raw: &str) -> Option<u32> {
    let digits: String = raw
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        TimeOfDay::parse_strict(&value).ok_or_else(|| format!("Invalid time of day: {}", value))
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        time.to_string()
    }
}

/// Discriminant persisted in the `reminder_type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderType {
    None,
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl ReminderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderType::None => "none",
            ReminderType::Once => "once",
            ReminderType::Daily => "daily",
            ReminderType::Weekly => "weekly",
            ReminderType::Monthly => "monthly",
        }
    }
}

impl FromStr for ReminderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(ReminderType::None),
            "once" => Ok(ReminderType::Once),
            "daily" => Ok(ReminderType::Daily),
            "weekly" => Ok(ReminderType::Weekly),
            "monthly" => Ok(ReminderType::Monthly),
            other => Err(format!("Unknown reminder type: {}", other)),
        }
    }
}

/// Reminder attached to an action. Exactly one shape is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase", from = "ReminderRepr")]
pub enum Reminder {
    #[default]
    None,
    /// Fires once at `at` (epoch milliseconds)
    Once { at: i64 },
    Daily { time: TimeOfDay },
    Weekly { time: TimeOfDay, weekday: Weekday },
    /// `monthday` is kept within 1..=31
    Monthly { time: TimeOfDay, monthday: u32 },
}

/// Wire shape of a [`Reminder`] before normalization
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ReminderRepr {
    None,
    Once { at: i64 },
    Daily { time: TimeOfDay },
    Weekly { time: TimeOfDay, weekday: Weekday },
    Monthly { time: TimeOfDay, monthday: u32 },
}

impl From<ReminderRepr> for Reminder {
    fn from(repr: ReminderRepr) -> Self {
        match repr {
            ReminderRepr::None => Reminder::None,
            ReminderRepr::Once { at } => Reminder::Once { at },
            ReminderRepr::Daily { time } => Reminder::Daily { time },
            ReminderRepr::Weekly { time, weekday } => Reminder::Weekly { time, weekday },
            ReminderRepr::Monthly { time, monthday } => Reminder::monthly(time, monthday),
        }
    }
}

/// Flat column representation of a [`Reminder`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReminderColumns {
    pub reminder_type: String,
    pub reminder_date: Option<i64>,
    pub reminder_time: Option<String>,
    pub reminder_weekday: Option<i64>,
    pub reminder_monthday: Option<i64>,
}

impl Reminder {
    pub fn monthly(time: TimeOfDay, monthday: u32) -> Self {
        Reminder::Monthly {
            time,
            monthday: monthday.clamp(1, 31),
        }
    }

    /// Same reminder with `monthday` brought back into range
    pub fn normalized(self) -> Self {
        match self {
            Reminder::Monthly { time, monthday } => Reminder::monthly(time, monthday),
            other => other,
        }
    }

    pub fn kind(&self) -> ReminderType {
        match self {
            Reminder::None => ReminderType::None,
            Reminder::Once { .. } => ReminderType::Once,
            Reminder::Daily { .. } => ReminderType::Daily,
            Reminder::Weekly { .. } => ReminderType::Weekly,
            Reminder::Monthly { .. } => ReminderType::Monthly,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Reminder::None)
    }

    pub fn to_columns(&self) -> ReminderColumns {
        let mut columns = ReminderColumns {
            reminder_type: self.kind().as_str().to_string(),
            ..Default::default()
        };

        match *self {
            Reminder::None => {}
            Reminder::Once { at } => columns.reminder_date = Some(at),
            Reminder::Daily { time } => columns.reminder_time = Some(time.to_string()),
            Reminder::Weekly { time, weekday } => {
                columns.reminder_time = Some(time.to_string());
                columns.reminder_weekday = Some(i64::from(weekday.number_from_monday()));
            }
            Reminder::Monthly { time, monthday } => {
                columns.reminder_time = Some(time.to_string());
                columns.reminder_monthday = Some(i64::from(monthday));
            }
        }

        columns
    }

    /// Rebuild a reminder from its columns.
    ///
    /// Fails when a field required by the declared type is missing or out
    /// of range.
    pub fn from_columns(columns: &ReminderColumns) -> std::result::Result<Self, String> {
        let kind: ReminderType = columns.reminder_type.parse()?;

        let time = || {
            columns
                .reminder_time
                .as_deref()
                .map(TimeOfDay::parse_lenient)
                .ok_or_else(|| format!("{} reminder without time", kind.as_str()))
        };

        match kind {
            ReminderType::None => Ok(Reminder::None),
            ReminderType::Once => columns
                .reminder_date
                .map(|at| Reminder::Once { at })
                .ok_or_else(|| "once reminder without date".to_string()),
            ReminderType::Daily => Ok(Reminder::Daily { time: time()? }),
            ReminderType::Weekly => {
                let weekday = columns
                    .reminder_weekday
                    .and_then(weekday_from_iso)
                    .ok_or_else(|| "weekly reminder without valid weekday".to_string())?;
                Ok(Reminder::Weekly {
                    time: time()?,
                    weekday,
                })
            }
            ReminderType::Monthly => {
                let monthday = columns
                    .reminder_monthday
                    .ok_or_else(|| "monthly reminder without day".to_string())?;
                Ok(Reminder::monthly(time()?, monthday.clamp(1, 31) as u32))
            }
        }
    }
}

/// Map an ISO weekday number (1 = Monday .. 7 = Sunday)
pub fn weekday_from_iso(value: i64) -> Option<Weekday> {
    match value {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// A user task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    pub title: String,
    pub list: Option<ActionList>,
    pub sort_index: i64,
    pub is_done: bool,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    pub updated_at: i64,
    pub reminder: Reminder,
}

/// Raw `actions` row
#[derive(Debug, Clone, FromRow)]
pub struct ActionRow {
    pub id: i64,
    pub title: String,
    pub list: Option<String>,
    pub sort_index: i64,
    pub is_done: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub reminder_type: String,
    pub reminder_date: Option<i64>,
    pub reminder_time: Option<String>,
    pub reminder_weekday: Option<i64>,
    pub reminder_monthday: Option<i64>,
}

impl From<ActionRow> for Action {
    fn from(row: ActionRow) -> Self {
        let columns = ReminderColumns {
            reminder_type: row.reminder_type,
            reminder_date: row.reminder_date,
            reminder_time: row.reminder_time,
            reminder_weekday: row.reminder_weekday,
            reminder_monthday: row.reminder_monthday,
        };

        let reminder = Reminder::from_columns(&columns).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed reminder on action {}: {}", row.id, e);
            Reminder::None
        });

        let list = row.list.as_deref().and_then(|value| match value.parse() {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::warn!("Treating action {} as unlisted: {}", row.id, e);
                None
            }
        });

        Action {
            id: row.id,
            title: row.title,
            list,
            sort_index: row.sort_index,
            is_done: row.is_done,
            created_at: row.created_at,
            updated_at: row.updated_at,
            reminder,
        }
    }
}

/// Insert request for a new action
#[derive(Debug, Clone)]
pub struct NewAction {
    pub title: String,
    pub list: Option<ActionList>,
    pub sort_index: i64,
    pub reminder: Reminder,
    pub now: i64,
}

/// User-editable fields of an action, as submitted by a create/edit form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDraft {
    pub title: String,
    pub list: Option<ActionList>,
    #[serde(default)]
    pub reminder: Reminder,
}

/// Application setting
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Mapping from a logical reminder key to the live platform handle
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationMeta {
    pub key: String,
    pub notification_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_lenient_parse() {
        assert_eq!(TimeOfDay::parse_lenient("08:30"), TimeOfDay { hour: 8, minute: 30 });
        assert_eq!(TimeOfDay::parse_lenient("7"), TimeOfDay { hour: 7, minute: 0 });
        assert_eq!(TimeOfDay::parse_lenient("xx:15"), TimeOfDay { hour: 0, minute: 15 });
        assert_eq!(TimeOfDay::parse_lenient("99:99"), TimeOfDay { hour: 23, minute: 59 });
        assert_eq!(TimeOfDay::parse_lenient(""), TimeOfDay { hour: 0, minute: 0 });
    }

    #[test]
    fn test_time_of_day_strict_parse() {
        assert_eq!(TimeOfDay::parse_strict("13:05"), TimeOfDay::new(13, 5));
        assert!(TimeOfDay::parse_strict("8:00").is_none());
        assert!(TimeOfDay::parse_strict("24:00").is_none());
        assert!(TimeOfDay::parse_strict("ab:cd").is_none());
        assert_eq!(TimeOfDay::new(9, 0).map(|t| t.to_string()).as_deref(), Some("09:00"));
    }

    #[test]
    fn test_reminder_columns() {
        let weekly = Reminder::Weekly {
            time: TimeOfDay::parse_lenient("08:00"),
            weekday: Weekday::Wed,
        };

        let columns = weekly.to_columns();
        assert_eq!(columns.reminder_type, "weekly");
        assert_eq!(columns.reminder_time.as_deref(), Some("08:00"));
        assert_eq!(columns.reminder_weekday, Some(3));
        assert_eq!(columns.reminder_date, None);
        assert_eq!(columns.reminder_monthday, None);

        assert_eq!(Reminder::from_columns(&columns).unwrap(), weekly);
    }

    #[test]
    fn test_malformed_reminder_columns() {
        let missing_weekday = ReminderColumns {
            reminder_type: "weekly".to_string(),
            reminder_time: Some("08:00".to_string()),
            ..Default::default()
        };
        assert!(Reminder::from_columns(&missing_weekday).is_err());

        let missing_date = ReminderColumns {
            reminder_type: "once".to_string(),
            ..Default::default()
        };
        assert!(Reminder::from_columns(&missing_date).is_err());

        let unknown = ReminderColumns {
            reminder_type: "hourly".to_string(),
            ..Default::default()
        };
        assert!(Reminder::from_columns(&unknown).is_err());
    }

    #[test]
    fn test_monthday_is_clamped() {
        let columns = ReminderColumns {
            reminder_type: "monthly".to_string(),
            reminder_time: Some("09:00".to_string()),
            reminder_monthday: Some(45),
            ..Default::default()
        };

        match Reminder::from_columns(&columns).unwrap() {
            Reminder::Monthly { monthday, .. } => assert_eq!(monthday, 31),
            other => panic!("unexpected reminder: {:?}", other),
        }

        assert_eq!(
            Reminder::monthly(TimeOfDay { hour: 9, minute: 0 }, 0),
            Reminder::Monthly {
                time: TimeOfDay { hour: 9, minute: 0 },
                monthday: 1
            }
        );
    }

    #[test]
    fn test_reminder_serde_shape() {
        let json = serde_json::to_value(Reminder::Daily {
            time: TimeOfDay { hour: 7, minute: 45 },
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "daily", "time": "07:45" }));

        let parsed: Reminder = serde_json::from_value(serde_json::json!({ "type": "none" })).unwrap();
        assert_eq!(parsed, Reminder::None);
    }

    #[test]
    fn test_deserialized_monthday_is_clamped() {
        let high: Reminder = serde_json::from_value(serde_json::json!({
            "type": "monthly",
            "time": "09:00",
            "monthday": 45
        }))
        .unwrap();
        assert_eq!(
            high,
            Reminder::Monthly {
                time: TimeOfDay { hour: 9, minute: 0 },
                monthday: 31
            }
        );

        let zero: Reminder = serde_json::from_value(serde_json::json!({
            "type": "monthly",
            "time": "09:00",
            "monthday": 0
        }))
        .unwrap();
        assert_eq!(zero, Reminder::monthly(TimeOfDay { hour: 9, minute: 0 }, 1));

        let literal = Reminder::Monthly {
            time: TimeOfDay { hour: 9, minute: 0 },
            monthday: 0,
        };
        assert_eq!(literal.normalized(), zero);
    }
}
