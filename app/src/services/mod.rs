//! Services module
//!
//! Business logic that coordinates the repository and the notification
//! platform.

pub mod actions;
pub mod digest;
pub mod ordering;
pub mod registry;
pub mod reminders;
pub mod responses;
pub mod settings;
pub mod snooze;

pub use actions::ActionsService;
pub use digest::ListDigestService;
pub use ordering::{OrderingService, ReorderOutcome};
pub use registry::NotificationRegistry;
pub use reminders::{ReminderService, ScheduleOutcome, SkipReason};
pub use responses::{ResponseHandler, ResponseOutcome};
pub use settings::{AppSettings, SettingsService};
pub use snooze::{SnoozePreset, SnoozeRequest, SnoozeService};
