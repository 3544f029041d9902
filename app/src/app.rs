//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::AppConfig;
use crate::database::{Repository, Store};
use crate::error::Result;
use crate::notifications::{setup_categories, NotificationPlatform};
use crate::services::{
    ActionsService, ListDigestService, NotificationRegistry, OrderingService, ReminderService,
    ResponseHandler, SettingsService, SnoozeService,
};
use std::sync::Arc;

/// Services bound to an open store
#[derive(Clone)]
pub struct Services {
    pub actions: ActionsService,
    pub ordering: OrderingService,
    pub reminders: ReminderService,
    pub digest: ListDigestService,
    pub settings: SettingsService,
    pub snooze: SnoozeService,
}

impl Services {
    pub fn new(repo: Repository, platform: Arc<dyn NotificationPlatform>) -> Self {
        let registry = NotificationRegistry::new(repo.clone(), platform);
        let digest = ListDigestService::new(registry.clone());

        Self {
            actions: ActionsService::new(registry.clone()),
            ordering: OrderingService::new(repo.clone()),
            reminders: ReminderService::new(registry.clone()),
            settings: SettingsService::new(repo, digest.clone()),
            snooze: SnoozeService::new(registry),
            digest,
        }
    }
}

/// Central application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub platform: Arc<dyn NotificationPlatform>,
}

impl AppState {
    pub fn new(config: AppConfig, platform: Arc<dyn NotificationPlatform>) -> Self {
        let store = Arc::new(Store::new(config.db_path.clone()));
        Self {
            config,
            store,
            platform,
        }
    }

    /// Application setup - called once on startup.
    ///
    /// Opening the store is fatal on failure; category registration, the
    /// digest refresh and restoring action reminders are not.
    pub async fn setup(&self) -> Result<Services> {
        tracing::info!("Initializing application");
        tracing::info!("Database path: {:?}", self.config.db_path);

        let repo = self.store.open().await?;

        if let Err(e) = setup_categories(self.platform.as_ref()).await {
            tracing::warn!("Failed to register notification categories: {}", e);
        }

        let services = Services::new(repo, Arc::clone(&self.platform));

        if let Err(e) = services.digest.refresh().await {
            tracing::warn!("Failed to refresh list digests: {}", e);
        }

        // Platform jobs do not outlive the process; the store does
        if let Err(e) = services.reminders.restore_all().await {
            tracing::warn!("Failed to restore action reminders: {}", e);
        }

        tracing::info!("Application initialized successfully");
        Ok(services)
    }

    pub fn response_handler(&self) -> Arc<ResponseHandler> {
        Arc::new(ResponseHandler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.platform),
        ))
    }
}
