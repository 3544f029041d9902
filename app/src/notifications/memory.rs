//! In-memory notification platform
//!
//! Keeps scheduled notifications in a map and records every cancel and
//! dismiss call. Permission and failures can be configured, which makes it
//! the platform used throughout the test suite.

use super::{
    NotificationAction, NotificationContent, NotificationHandle, NotificationPlatform,
    NotificationResponse, PermissionStatus, Trigger,
};
use crate::error::PlatformError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// A notification currently scheduled on the platform
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNotification {
    pub handle: NotificationHandle,
    pub content: NotificationContent,
    pub trigger: Trigger,
}

struct MemoryState {
    permission: PermissionStatus,
    grant_on_request: bool,
    permission_requests: usize,
    scheduled: Vec<ScheduledNotification>,
    schedule_calls: usize,
    cancel_calls: Vec<NotificationHandle>,
    dismiss_calls: Vec<NotificationHandle>,
    categories: HashMap<String, Vec<NotificationAction>>,
    fail_schedule: bool,
}

pub struct MemoryPlatform {
    state: Mutex<MemoryState>,
    responses: watch::Sender<Option<NotificationResponse>>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    /// Platform with permission already granted
    pub fn new() -> Self {
        Self::with_permission(PermissionStatus::GRANTED, true)
    }

    /// Platform with the given permission state; `grant_on_request` decides
    /// the answer to a permission prompt.
    pub fn with_permission(permission: PermissionStatus, grant_on_request: bool) -> Self {
        let (responses, _) = watch::channel(None);

        Self {
            state: Mutex::new(MemoryState {
                permission,
                grant_on_request,
                permission_requests: 0,
                scheduled: Vec::new(),
                schedule_calls: 0,
                cancel_calls: Vec::new(),
                dismiss_calls: Vec::new(),
                categories: HashMap::new(),
                fail_schedule: false,
            }),
            responses,
        }
    }

    /// Make every following `schedule` call fail (or succeed again)
    pub async fn fail_schedules(&self, fail: bool) {
        self.state.lock().await.fail_schedule = fail;
    }

    pub async fn set_permission(&self, permission: PermissionStatus) {
        self.state.lock().await.permission = permission;
    }

    pub async fn scheduled(&self) -> Vec<ScheduledNotification> {
        self.state.lock().await.scheduled.clone()
    }

    pub async fn find(&self, handle: &NotificationHandle) -> Option<ScheduledNotification> {
        self.state
            .lock()
            .await
            .scheduled
            .iter()
            .find(|n| &n.handle == handle)
            .cloned()
    }

    /// Number of successful `schedule` calls
    pub async fn schedule_calls(&self) -> usize {
        self.state.lock().await.schedule_calls
    }

    pub async fn cancel_calls(&self) -> Vec<NotificationHandle> {
        self.state.lock().await.cancel_calls.clone()
    }

    pub async fn dismiss_calls(&self) -> Vec<NotificationHandle> {
        self.state.lock().await.dismiss_calls.clone()
    }

    pub async fn permission_requests(&self) -> usize {
        self.state.lock().await.permission_requests
    }

    pub async fn categories(&self) -> HashMap<String, Vec<NotificationAction>> {
        self.state.lock().await.categories.clone()
    }

    /// Simulate the user pressing `action_identifier` on a scheduled
    /// notification. One-shot notifications count as fired and leave the
    /// schedule.
    pub async fn respond(
        &self,
        handle: &NotificationHandle,
        action_identifier: &str,
    ) -> Option<NotificationResponse> {
        let notification = {
            let mut state = self.state.lock().await;
            let position = state.scheduled.iter().position(|n| &n.handle == handle)?;
            if state.scheduled[position].trigger.is_one_shot() {
                state.scheduled.remove(position)
            } else {
                state.scheduled[position].clone()
            }
        };

        let response = NotificationResponse {
            notification_id: notification.handle,
            action_identifier: action_identifier.to_string(),
            content: notification.content,
            trigger: Some(notification.trigger),
        };

        self.deliver_response(response.clone());
        Some(response)
    }

    /// Put a response in the "last response" slot
    pub fn deliver_response(&self, response: NotificationResponse) {
        self.responses.send_replace(Some(response));
    }
}

#[async_trait]
impl NotificationPlatform for MemoryPlatform {
    async fn permission_status(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(self.state.lock().await.permission)
    }

    async fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
        let mut state = self.state.lock().await;
        state.permission_requests += 1;
        if state.grant_on_request {
            state.permission = PermissionStatus::GRANTED;
        }
        Ok(state.permission)
    }

    async fn set_category(
        &self,
        identifier: &str,
        actions: Vec<NotificationAction>,
    ) -> Result<(), PlatformError> {
        self.state
            .lock()
            .await
            .categories
            .insert(identifier.to_string(), actions);
        Ok(())
    }

    async fn schedule(
        &self,
        content: NotificationContent,
        trigger: Trigger,
    ) -> Result<NotificationHandle, PlatformError> {
        let mut state = self.state.lock().await;
        if state.fail_schedule {
            return Err(PlatformError::new("scheduling rejected"));
        }

        let handle = NotificationHandle(Uuid::new_v4().to_string());
        state.scheduled.push(ScheduledNotification {
            handle: handle.clone(),
            content,
            trigger,
        });
        state.schedule_calls += 1;

        Ok(handle)
    }

    async fn cancel_scheduled(&self, handle: &NotificationHandle) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.cancel_calls.push(handle.clone());

        let before = state.scheduled.len();
        state.scheduled.retain(|n| &n.handle != handle);

        if state.scheduled.len() == before {
            return Err(PlatformError::new(format!("no scheduled notification {}", handle)));
        }
        Ok(())
    }

    async fn dismiss(&self, handle: &NotificationHandle) -> Result<(), PlatformError> {
        self.state.lock().await.dismiss_calls.push(handle.clone());
        Ok(())
    }

    async fn last_response(&self) -> Result<Option<NotificationResponse>, PlatformError> {
        Ok(self.responses.borrow().clone())
    }

    async fn clear_last_response(&self) -> Result<(), PlatformError> {
        self.responses.send_replace(None);
        Ok(())
    }

    fn subscribe_responses(&self) -> watch::Receiver<Option<NotificationResponse>> {
        self.responses.subscribe()
    }
}
