//! Repository layer for database operations
//!
//! This module provides CRUD operations for actions, settings and the
//! notification registry. Multi-row sort index rewrites run inside a
//! single transaction.

use super::models::*;
use crate::config::SORT_GAP;
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::SqlitePool;

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Actions =====

    /// Insert a new action
    pub async fn insert_action(&self, req: NewAction) -> Result<Action> {
        let columns = req.reminder.to_columns();

        let row = sqlx::query_as::<_, ActionRow>(
            r#"
            INSERT INTO actions
                (title, list, sort_index, is_done, created_at, updated_at,
                 reminder_type, reminder_date, reminder_time, reminder_weekday, reminder_monthday)
            VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(req.list.map(ActionList::as_str))
        .bind(req.sort_index)
        .bind(req.now)
        .bind(req.now)
        .bind(&columns.reminder_type)
        .bind(columns.reminder_date)
        .bind(&columns.reminder_time)
        .bind(columns.reminder_weekday)
        .bind(columns.reminder_monthday)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created action: {}", row.id);
        Ok(row.into())
    }

    /// Get an action by ID
    pub async fn get_action(&self, id: i64) -> Result<Action> {
        self.find_action(id)
            .await?
            .ok_or(AppError::ActionNotFound(id))
    }

    pub async fn find_action(&self, id: i64) -> Result<Option<Action>> {
        let row = sqlx::query_as::<_, ActionRow>("SELECT * FROM actions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Action::from))
    }

    /// All not-done actions, in sort order
    pub async fn list_active(&self) -> Result<Vec<Action>> {
        let rows = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT * FROM actions
            WHERE is_done = 0
            ORDER BY sort_index ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Action::from).collect())
    }

    /// Not-done actions of one partition (`None` = no list), in sort order
    pub async fn list_active_in(&self, list: Option<ActionList>) -> Result<Vec<Action>> {
        let rows = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT * FROM actions
            WHERE is_done = 0 AND list IS ?
            ORDER BY sort_index ASC, id ASC
            "#,
        )
        .bind(list.map(ActionList::as_str))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Action::from).collect())
    }

    pub async fn count_active_in_list(&self, list: ActionList) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM actions WHERE is_done = 0 AND list = ?")
                .bind(list.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// First `limit` not-done actions of a list, in sort order
    pub async fn top_active_in_list(&self, list: ActionList, limit: i64) -> Result<Vec<Action>> {
        let rows = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT * FROM actions
            WHERE is_done = 0 AND list = ?
            ORDER BY sort_index ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(list.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Action::from).collect())
    }

    pub async fn min_sort_index(&self, list: Option<ActionList>) -> Result<Option<i64>> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT MIN(sort_index) FROM actions WHERE is_done = 0 AND list IS ?")
                .bind(list.map(ActionList::as_str))
                .fetch_one(&self.pool)
                .await?;

        Ok(value)
    }

    pub async fn max_sort_index(&self, list: Option<ActionList>) -> Result<Option<i64>> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sort_index) FROM actions WHERE is_done = 0 AND list IS ?")
                .bind(list.map(ActionList::as_str))
                .fetch_one(&self.pool)
                .await?;

        Ok(value)
    }

    /// Write every field of an action, refreshing `updated_at`
    pub async fn update_action(&self, action: &Action) -> Result<Action> {
        let columns = action.reminder.to_columns();

        let row = sqlx::query_as::<_, ActionRow>(
            r#"
            UPDATE actions
            SET title = ?, list = ?, sort_index = ?, is_done = ?, updated_at = ?,
                reminder_type = ?, reminder_date = ?, reminder_time = ?,
                reminder_weekday = ?, reminder_monthday = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&action.title)
        .bind(action.list.map(ActionList::as_str))
        .bind(action.sort_index)
        .bind(action.is_done)
        .bind(now_ms())
        .bind(&columns.reminder_type)
        .bind(columns.reminder_date)
        .bind(&columns.reminder_time)
        .bind(columns.reminder_weekday)
        .bind(columns.reminder_monthday)
        .bind(action.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ActionNotFound(action.id))?;

        tracing::debug!("Updated action: {}", action.id);
        Ok(row.into())
    }

    pub async fn update_sort_index(&self, id: i64, sort_index: i64) -> Result<()> {
        let rows = sqlx::query("UPDATE actions SET sort_index = ?, updated_at = ? WHERE id = ?")
            .bind(sort_index)
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ActionNotFound(id));
        }

        tracing::debug!("Moved action {} to sort index {}", id, sort_index);
        Ok(())
    }

    pub async fn mark_done(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("UPDATE actions SET is_done = 1, updated_at = ? WHERE id = ?")
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ActionNotFound(id));
        }

        tracing::debug!("Marked action done: {}", id);
        Ok(())
    }

    /// Permanently delete an action.
    ///
    /// Its notification registry entry is left alone; callers cancel the
    /// reminder themselves.
    pub async fn delete_action(&self, id: i64) -> Result<()> {
        let rows = sqlx::query("DELETE FROM actions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ActionNotFound(id));
        }

        tracing::debug!("Deleted action: {}", id);
        Ok(())
    }

    /// Renumber the given actions to `0, GAP, 2*GAP, ...` in slice order,
    /// all or nothing.
    pub async fn apply_sort_order(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let now = now_ms();
        let mut tx = self.pool.begin().await?;

        for (position, id) in ids.iter().enumerate() {
            sqlx::query("UPDATE actions SET sort_index = ?, updated_at = ? WHERE id = ?")
                .bind(position as i64 * SORT_GAP)
                .bind(now)
                .bind(*id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Applied sort order to {} actions", ids.len());
        Ok(())
    }

    /// Renumber a partition's not-done actions in their current order.
    ///
    /// Reading the order and rewriting it happen in the same transaction.
    /// Returns the number of renumbered actions.
    pub async fn rebalance_partition(&self, list: Option<ActionList>) -> Result<usize> {
        let now = now_ms();
        let mut tx = self.pool.begin().await?;

        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM actions WHERE is_done = 0 AND list IS ? ORDER BY sort_index ASC, id ASC",
        )
        .bind(list.map(ActionList::as_str))
        .fetch_all(&mut *tx)
        .await?;

        for (position, id) in ids.iter().enumerate() {
            sqlx::query("UPDATE actions SET sort_index = ?, updated_at = ? WHERE id = ?")
                .bind(position as i64 * SORT_GAP)
                .bind(now)
                .bind(*id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Rebalanced {} actions in partition {:?}", ids.len(), list);
        Ok(ids.len())
    }

    // ===== Settings =====

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_settings(&self) -> Result<Vec<Setting>> {
        let settings = sqlx::query_as::<_, Setting>("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(settings)
    }

    // ===== Notification registry =====

    pub async fn get_notification_id(&self, key: &str) -> Result<Option<String>> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT notification_id FROM notification_meta WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn set_notification_id(&self, key: &str, notification_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_meta (key, notification_id) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET notification_id = excluded.notification_id
            "#,
        )
        .bind(key)
        .bind(notification_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_notification_meta(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM notification_meta WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn list_notification_meta(&self) -> Result<Vec<NotificationMeta>> {
        let rows = sqlx::query_as::<_, NotificationMeta>(
            "SELECT key, notification_id FROM notification_meta ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
