//! Tasklists library
//!
//! This library exposes the core functionality of Tasklists: ordered
//! actions in two lists, per-action reminders, daily list digests and the
//! snooze flow, on top of SQLite and a pluggable notification platform.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod notifications;
pub mod services;
