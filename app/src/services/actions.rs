//! Actions service
//!
//! The operations the lists drive: create, edit, complete, delete and
//! reorder actions. Store errors fail the operation. Reminder and digest
//! updates that follow a successful write are best effort and only logged.

use super::digest::ListDigestService;
use super::ordering::{OrderingService, ReorderOutcome};
use super::registry::NotificationRegistry;
use super::reminders::ReminderService;
use crate::database::repository::now_ms;
use crate::database::{Action, ActionDraft, ActionList, NewAction, Reminder, Repository};
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct ActionsService {
    repo: Repository,
    ordering: OrderingService,
    reminders: ReminderService,
    digest: ListDigestService,
}

impl ActionsService {
    pub fn new(registry: NotificationRegistry) -> Self {
        let repo = registry.repository().clone();

        Self {
            ordering: OrderingService::new(repo.clone()),
            reminders: ReminderService::new(registry.clone()),
            digest: ListDigestService::new(registry),
            repo,
        }
    }

    pub async fn get(&self, id: i64) -> Result<Action> {
        self.repo.get_action(id).await
    }

    /// Every not-done action, in sort order
    pub async fn list_active(&self) -> Result<Vec<Action>> {
        self.repo.list_active().await
    }

    /// Not-done actions of one partition (`None` = no list)
    pub async fn list_active_in(&self, list: Option<ActionList>) -> Result<Vec<Action>> {
        self.repo.list_active_in(list).await
    }

    pub async fn create(&self, draft: ActionDraft) -> Result<Action> {
        let now = now_ms();
        let draft = validate(draft, now, true)?;
        let sort_index = self.ordering.sort_index_for_new(draft.list).await?;

        let action = self
            .repo
            .insert_action(NewAction {
                title: draft.title,
                list: draft.list,
                sort_index,
                reminder: draft.reminder,
                now,
            })
            .await?;

        tracing::info!("Created action {} in {:?}", action.id, action.list);

        if let Err(e) = self.reminders.schedule(&action).await {
            tracing::warn!("Failed to schedule reminder for action {}: {}", action.id, e);
        }
        self.refresh_digests().await;

        Ok(action)
    }

    /// Apply an edit. Moving to another list places the action as if it
    /// were new there.
    pub async fn update(&self, id: i64, draft: ActionDraft) -> Result<Action> {
        let existing = self.repo.get_action(id).await?;
        let reminder_changed = existing.reminder != draft.reminder.normalized();
        let draft = validate(draft, now_ms(), reminder_changed)?;

        let list_changed = existing.list != draft.list;
        let title_changed = existing.title != draft.title;
        let sort_index = if list_changed {
            self.ordering.sort_index_for_new(draft.list).await?
        } else {
            existing.sort_index
        };

        let updated = self
            .repo
            .update_action(&Action {
                title: draft.title,
                list: draft.list,
                sort_index,
                reminder: draft.reminder,
                ..existing
            })
            .await?;

        tracing::info!("Updated action {}", id);

        if reminder_changed {
            if let Err(e) = self.reminders.reschedule(&updated).await {
                tracing::warn!("Failed to reschedule reminder for action {}: {}", id, e);
            }
        }
        if list_changed || title_changed {
            self.refresh_digests().await;
        }

        Ok(updated)
    }

    /// Mark an action done and stop its reminder
    pub async fn complete(&self, id: i64) -> Result<()> {
        self.repo.mark_done(id).await?;
        tracing::info!("Completed action {}", id);

        if let Err(e) = self.reminders.cancel(id).await {
            tracing::warn!("Failed to cancel reminder for action {}: {}", id, e);
        }
        self.refresh_digests().await;

        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.repo.delete_action(id).await?;
        tracing::info!("Deleted action {}", id);

        if let Err(e) = self.reminders.cancel(id).await {
            tracing::warn!("Failed to cancel reminder for action {}: {}", id, e);
        }
        self.refresh_digests().await;

        Ok(())
    }

    /// Drag `displayed[from]` to position `to` of the sequence on screen
    pub async fn reorder(&self, displayed: &[Action], from: usize, to: usize) -> Result<ReorderOutcome> {
        let outcome = self.ordering.reorder(displayed, from, to).await?;

        if outcome != ReorderOutcome::Unchanged {
            self.refresh_digests().await;
        }

        Ok(outcome)
    }

    async fn refresh_digests(&self) {
        if let Err(e) = self.digest.refresh().await {
            tracing::warn!("Failed to refresh list digests: {}", e);
        }
    }
}

/// Trim and check a submitted draft.
///
/// A one-time reminder must lie in the future when it is being set.
fn validate(draft: ActionDraft, now: i64, check_reminder: bool) -> Result<ActionDraft> {
    let title = draft.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    if check_reminder {
        if let Reminder::Once { at } = draft.reminder {
            if at <= now {
                return Err(AppError::Validation(
                    "Reminder date must be in the future".to_string(),
                ));
            }
        }
    }

    Ok(ActionDraft {
        title,
        list: draft.list,
        reminder: draft.reminder.normalized(),
    })
}
