//! Local notification platform
//!
//! Delivers notifications inside the running process using
//! tokio-cron-scheduler: date triggers become one-shot jobs, recurring
//! triggers become cron jobs evaluated in the local time zone. Delivered
//! notifications are logged and kept until dismissed, and a response can be
//! injected for any of them.

use super::{
    NotificationAction, NotificationContent, NotificationHandle, NotificationPlatform,
    NotificationResponse, PermissionStatus, Trigger,
};
use crate::error::PlatformError;
use async_trait::async_trait;
use chrono::{Local, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Cron day-of-week names, indexed by `weekday - 1` (1 = Sunday)
const CRON_WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A notification that has fired and is still visible
#[derive(Debug, Clone)]
pub struct DeliveredNotification {
    pub content: NotificationContent,
    pub trigger: Trigger,
}

pub struct LocalNotifier {
    scheduler: Arc<RwLock<JobScheduler>>,
    delivered: Arc<Mutex<HashMap<String, DeliveredNotification>>>,
    categories: Mutex<HashMap<String, Vec<NotificationAction>>>,
    responses: watch::Sender<Option<NotificationResponse>>,
}

impl LocalNotifier {
    pub async fn new() -> Result<Self, PlatformError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| PlatformError::new(format!("Failed to create scheduler: {}", e)))?;
        let (responses, _) = watch::channel(None);

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            delivered: Arc::new(Mutex::new(HashMap::new())),
            categories: Mutex::new(HashMap::new()),
            responses,
        })
    }

    pub async fn start(&self) -> Result<(), PlatformError> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| PlatformError::new(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Local notification scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), PlatformError> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| PlatformError::new(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Local notification scheduler shutdown");
        Ok(())
    }

    /// Notifications that fired and were not dismissed yet
    pub async fn delivered(&self) -> HashMap<String, DeliveredNotification> {
        self.delivered.lock().await.clone()
    }

    /// Record the user pressing `action_identifier` on a delivered
    /// notification.
    pub async fn respond(
        &self,
        handle: &NotificationHandle,
        action_identifier: &str,
    ) -> Option<NotificationResponse> {
        let delivered = self.delivered.lock().await.get(handle.as_str()).cloned()?;

        let response = NotificationResponse {
            notification_id: handle.clone(),
            action_identifier: action_identifier.to_string(),
            content: delivered.content,
            trigger: Some(delivered.trigger),
        };

        self.responses.send_replace(Some(response.clone()));
        Some(response)
    }
}

/// Cron expression (with seconds) for a recurring trigger
pub fn cron_expression(trigger: &Trigger) -> Result<String, PlatformError> {
    match *trigger {
        Trigger::Date { .. } => Err(PlatformError::new("date triggers are not cron based")),
        Trigger::Daily { hour, minute } => Ok(format!("0 {} {} * * *", minute, hour)),
        Trigger::Weekly {
            weekday,
            hour,
            minute,
        } => {
            let name = weekday
                .checked_sub(1)
                .and_then(|index| CRON_WEEKDAYS.get(index as usize))
                .ok_or_else(|| PlatformError::new(format!("invalid weekday {}", weekday)))?;
            Ok(format!("0 {} {} * * {}", minute, hour, name))
        }
        Trigger::Monthly { day, hour, minute } => {
            if !(1..=31).contains(&day) {
                return Err(PlatformError::new(format!("invalid day of month {}", day)));
            }
            Ok(format!("0 {} {} {} * *", minute, hour, day))
        }
    }
}

#[async_trait]
impl NotificationPlatform for LocalNotifier {
    async fn permission_status(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(PermissionStatus::GRANTED)
    }

    async fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(PermissionStatus::GRANTED)
    }

    async fn set_category(
        &self,
        identifier: &str,
        actions: Vec<NotificationAction>,
    ) -> Result<(), PlatformError> {
        self.categories
            .lock()
            .await
            .insert(identifier.to_string(), actions);
        Ok(())
    }

    async fn schedule(
        &self,
        content: NotificationContent,
        trigger: Trigger,
    ) -> Result<NotificationHandle, PlatformError> {
        let delivered = Arc::clone(&self.delivered);
        let job_content = content.clone();

        let run = move |job_id: Uuid, _scheduler: JobScheduler| {
            let delivered = Arc::clone(&delivered);
            let content = job_content.clone();
            Box::pin(async move {
                tracing::info!("Notification: {} - {}", content.title, content.body);
                delivered
                    .lock()
                    .await
                    .insert(job_id.to_string(), DeliveredNotification { content, trigger });
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        let job = match trigger {
            Trigger::Date { at } => {
                let delay = (at - Utc::now()).to_std().unwrap_or_default();
                Job::new_one_shot_async(delay, run)
            }
            _ => {
                let cron = cron_expression(&trigger)?;
                Job::new_async_tz(cron, Local, run)
            }
        }
        .map_err(|e| PlatformError::new(format!("Failed to create notification job: {}", e)))?;

        let job_id = job.guid();

        let scheduler = self.scheduler.read().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| PlatformError::new(format!("Failed to schedule notification: {}", e)))?;

        tracing::debug!("Scheduled notification {} ({:?})", job_id, trigger);
        Ok(NotificationHandle(job_id.to_string()))
    }

    async fn cancel_scheduled(&self, handle: &NotificationHandle) -> Result<(), PlatformError> {
        let job_id = Uuid::parse_str(handle.as_str())
            .map_err(|e| PlatformError::new(format!("Invalid notification handle: {}", e)))?;

        let scheduler = self.scheduler.read().await;
        scheduler
            .remove(&job_id)
            .await
            .map_err(|e| PlatformError::new(format!("Failed to cancel notification: {}", e)))?;

        tracing::debug!("Cancelled notification {}", job_id);
        Ok(())
    }

    async fn dismiss(&self, handle: &NotificationHandle) -> Result<(), PlatformError> {
        self.delivered.lock().await.remove(handle.as_str());
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cron_expressions() {
        assert_eq!(
            cron_expression(&Trigger::Daily { hour: 8, minute: 5 }).unwrap(),
            "0 5 8 * * *"
        );
        assert_eq!(
            cron_expression(&Trigger::Weekly {
                weekday: 4,
                hour: 8,
                minute: 0
            })
            .unwrap(),
            "0 0 8 * * Wed"
        );
        assert_eq!(
            cron_expression(&Trigger::Monthly {
                day: 31,
                hour: 21,
                minute: 30
            })
            .unwrap(),
            "0 30 21 31 * *"
        );
    }

    #[test]
    fn test_invalid_cron_triggers() {
        assert!(cron_expression(&Trigger::Date { at: Utc::now() }).is_err());
        assert!(cron_expression(&Trigger::Weekly {
            weekday: 0,
            hour: 8,
            minute: 0
        })
        .is_err());
        assert!(cron_expression(&Trigger::Monthly {
            day: 32,
            hour: 8,
            minute: 0
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_schedule_and_cancel_recurring() {
        let notifier = LocalNotifier::new().await.unwrap();

        let handle = notifier
            .schedule(
                NotificationContent {
                    title: "Daily".to_string(),
                    body: "body".to_string(),
                    ..Default::default()
                },
                Trigger::Daily { hour: 3, minute: 0 },
            )
            .await
            .unwrap();

        assert!(Uuid::parse_str(handle.as_str()).is_ok());
        notifier.cancel_scheduled(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_one_shot_delivery_and_response() {
        let notifier = LocalNotifier::new().await.unwrap();
        notifier.start().await.unwrap();

        let handle = notifier
            .schedule(
                NotificationContent {
                    title: "Soon".to_string(),
                    body: "body".to_string(),
                    ..Default::default()
                },
                Trigger::Date {
                    at: Utc::now() + Duration::milliseconds(200),
                },
            )
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
        while !notifier.delivered().await.contains_key(handle.as_str()) {
            assert!(tokio::time::Instant::now() < deadline, "notification never delivered");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        let response = notifier.respond(&handle, "SNOOZE_10M").await.unwrap();
        assert_eq!(response.content.title, "Soon");
        assert_eq!(notifier.last_response().await.unwrap(), Some(response));

        notifier.dismiss(&handle).await.unwrap();
        assert!(notifier.delivered().await.is_empty());

        notifier.shutdown().await.unwrap();
    }
}
