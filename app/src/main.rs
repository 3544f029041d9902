// Tasklists - ordered personal and work actions with reminders
// Entry point and application setup

use std::sync::Arc;
use tasklists::app::AppState;
use tasklists::config::AppConfig;
use tasklists::notifications::{LocalNotifier, NotificationPlatform};
use tasklists::services::ResponseOutcome;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasklists=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tasklists");

    let notifier = Arc::new(LocalNotifier::new().await?);
    notifier.start().await?;

    let state = AppState::new(AppConfig::from_env(), notifier.clone());
    let services = state.setup().await?;

    let active = services.actions.list_active().await?;
    tracing::info!("{} active actions", active.len());

    let (outcomes_tx, mut outcomes_rx) = mpsc::unbounded_channel();
    let handler = state.response_handler();
    let handler_task = tokio::spawn(handler.run(notifier.subscribe_responses(), outcomes_tx));

    let outcome_task = tokio::spawn(async move {
        while let Some(outcome) = outcomes_rx.recv().await {
            match outcome {
                ResponseOutcome::Snoozed {
                    feedback: Some(message),
                    ..
                }
                | ResponseOutcome::SnoozeFailed {
                    feedback: Some(message),
                } => tracing::info!("{}", message),
                ResponseOutcome::OpenSnoozeScreen(request) => {
                    tracing::info!("Snooze requested for '{}'", request.title)
                }
                other => tracing::debug!("Response outcome: {:?}", other),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    handler_task.abort();
    outcome_task.abort();
    notifier.shutdown().await?;

    Ok(())
}
