//! Notification response handling
//!
//! Reacts to the user pressing a button on a notification. The platform
//! keeps a single "last response" slot; the handler remembers the last
//! response key it acted on so a redelivered response is ignored.
//! Nothing is handled until the store is open.

use super::registry::NotificationRegistry;
use super::settings::debug_feedback_enabled;
use super::snooze::{build_snooze_data, SnoozePreset, SnoozeRequest, SnoozeService};
use crate::database::{Repository, Store};
use crate::error::PlatformError;
use crate::notifications::{
    NotificationHandle, NotificationPlatform, NotificationResponse, SNOOZE_10M, SNOOZE_1H,
    SNOOZE_MORE,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

/// What handling a response did
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The store is not open yet; the response was left in place
    Deferred,
    /// Same notification and button as the previous response
    Duplicate,
    Snoozed {
        handle: NotificationHandle,
        /// Set when debug feedback is enabled
        feedback: Option<String>,
    },
    SnoozeFailed { feedback: Option<String> },
    /// "More…" was pressed: let the user pick a snooze time
    OpenSnoozeScreen(SnoozeRequest),
    /// Plain tap or unknown button
    Acknowledged,
}

pub struct ResponseHandler {
    store: Arc<Store>,
    platform: Arc<dyn NotificationPlatform>,
    last_handled: Mutex<Option<String>>,
}

impl ResponseHandler {
    pub fn new(store: Arc<Store>, platform: Arc<dyn NotificationPlatform>) -> Self {
        Self {
            store,
            platform,
            last_handled: Mutex::new(None),
        }
    }

    pub async fn handle(&self, response: &NotificationResponse) -> ResponseOutcome {
        let Some(repo) = self.store.get() else {
            tracing::debug!("Store not ready, deferring response {}", response.response_key());
            return ResponseOutcome::Deferred;
        };

        let key = response.response_key();
        {
            let mut last = self.last_handled.lock().await;
            if last.as_deref() == Some(key.as_str()) {
                tracing::debug!("Ignoring repeated response {}", key);
                return ResponseOutcome::Duplicate;
            }
            *last = Some(key);
        }

        let request = SnoozeRequest {
            title: response.content.title.clone(),
            body: response.content.body.clone(),
            data: build_snooze_data(&response.content.data, response.trigger.as_ref()),
            source: Some(response.notification_id.clone()),
        };

        match response.action_identifier.as_str() {
            SNOOZE_10M => {
                self.quick_snooze(repo, response, &request, SnoozePreset::TenMinutes)
                    .await
            }
            SNOOZE_1H => {
                self.quick_snooze(repo, response, &request, SnoozePreset::OneHour)
                    .await
            }
            SNOOZE_MORE => {
                self.dismiss_handled(&response.notification_id).await;
                ResponseOutcome::OpenSnoozeScreen(request)
            }
            _ => {
                self.clear_response().await;
                ResponseOutcome::Acknowledged
            }
        }
    }

    /// Handle whatever sits in the platform's last-response slot
    pub async fn poll(&self) -> Result<Option<ResponseOutcome>, PlatformError> {
        match self.platform.last_response().await? {
            Some(response) => Ok(Some(self.handle(&response).await)),
            None => Ok(None),
        }
    }

    /// Handle responses until the platform drops its sender.
    ///
    /// Outcomes are forwarded to `outcomes`; a closed receiver is ignored.
    pub async fn run(
        self: Arc<Self>,
        mut responses: watch::Receiver<Option<NotificationResponse>>,
        outcomes: mpsc::UnboundedSender<ResponseOutcome>,
    ) {
        tracing::info!("Notification response handler started");

        loop {
            let current = responses.borrow_and_update().clone();
            if let Some(response) = current {
                let outcome = self.handle(&response).await;
                tracing::debug!("Response {} -> {:?}", response.response_key(), outcome);
                let _ = outcomes.send(outcome);
            }

            if responses.changed().await.is_err() {
                break;
            }
        }

        tracing::info!("Notification response handler stopped");
    }

    async fn quick_snooze(
        &self,
        repo: Repository,
        response: &NotificationResponse,
        request: &SnoozeRequest,
        preset: SnoozePreset,
    ) -> ResponseOutcome {
        let debug = debug_feedback_enabled(&repo).await;
        let snooze = SnoozeService::new(NotificationRegistry::new(repo, Arc::clone(&self.platform)));

        match snooze.snooze_preset(request, preset).await {
            Ok(handle) => {
                self.dismiss_handled(&response.notification_id).await;
                ResponseOutcome::Snoozed {
                    handle,
                    feedback: debug.then(|| format!("Snoozed for {}", preset.label())),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to snooze notification {}: {}", response.notification_id, e);
                self.clear_response().await;
                ResponseOutcome::SnoozeFailed {
                    feedback: debug.then(|| format!("Unable to snooze ({})", preset.short_label())),
                }
            }
        }
    }

    async fn dismiss_handled(&self, handle: &NotificationHandle) {
        if let Err(e) = self.platform.dismiss(handle).await {
            tracing::debug!("Notification {} already dismissed: {}", handle, e);
        }
        self.clear_response().await;
    }

    async fn clear_response(&self) {
        if let Err(e) = self.platform.clear_last_response().await {
            tracing::debug!("Failed to clear last response: {}", e);
        }
    }
}
