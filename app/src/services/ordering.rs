//! Ordering service
//!
//! Keeps per-partition `sort_index` values so that ascending order is the
//! user's order. Moves take the integer midpoint of the new neighbours; when
//! two neighbours are adjacent integers the whole partition is renumbered
//! to `0, GAP, 2*GAP, ...` in one transaction.

use crate::config::SORT_GAP;
use crate::database::{Action, ActionList, Repository};
use crate::error::Result;
use serde::Serialize;

/// What a reorder did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReorderOutcome {
    /// Nothing to do: same position, out of range, or no neighbour
    Unchanged,
    Moved { id: i64, sort_index: i64 },
    /// The partition was renumbered; callers should reload it
    Rebalanced { list: Option<ActionList> },
}

/// Store changes needed to apply a reorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderPlan {
    Unchanged,
    Move { id: i64, sort_index: i64 },
    /// Renumber the partition in this order
    Rebalance {
        list: Option<ActionList>,
        ids: Vec<i64>,
    },
}

/// Floor of the mean of two indices, without leaving `i64`
pub fn midpoint(before: i64, after: i64) -> i64 {
    before + (after - before).div_euclid(2)
}

/// Adjacent (or equal) neighbours leave no integer room between them
pub fn needs_rebalance(before: i64, after: i64) -> bool {
    before.abs_diff(after) < 2
}

/// Work out the new position of `displayed[from]` once dropped at `to`.
///
/// `displayed` is the sequence currently on screen, possibly mixing
/// partitions. Only neighbours from the moved action's own partition count.
pub fn plan_reorder(displayed: &[Action], from: usize, to: usize) -> ReorderPlan {
    if from == to || from >= displayed.len() || to >= displayed.len() {
        return ReorderPlan::Unchanged;
    }

    let mut reordered: Vec<&Action> = displayed.iter().collect();
    let moved = reordered.remove(from);
    reordered.insert(to, moved);

    let list = moved.list;
    let before = reordered[..to].iter().rev().find(|a| a.list == list);
    let after = reordered[to + 1..].iter().find(|a| a.list == list);

    let sort_index = match (before, after) {
        (None, None) => return ReorderPlan::Unchanged,
        (Some(before), None) => before.sort_index + SORT_GAP,
        (None, Some(after)) => after.sort_index - SORT_GAP,
        (Some(before), Some(after)) => {
            if needs_rebalance(before.sort_index, after.sort_index) {
                let ids = reordered
                    .iter()
                    .filter(|a| a.list == list)
                    .map(|a| a.id)
                    .collect();
                return ReorderPlan::Rebalance { list, ids };
            }
            midpoint(before.sort_index, after.sort_index)
        }
    };

    ReorderPlan::Move {
        id: moved.id,
        sort_index,
    }
}

#[derive(Clone)]
pub struct OrderingService {
    repo: Repository,
}

impl OrderingService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Index for an action entering `list`: tail of a real list, head of
    /// the unlisted partition, 0 for an empty partition.
    pub async fn sort_index_for_new(&self, list: Option<ActionList>) -> Result<i64> {
        let index = match list {
            Some(_) => self
                .repo
                .max_sort_index(list)
                .await?
                .map_or(0, |max| max + SORT_GAP),
            None => self
                .repo
                .min_sort_index(list)
                .await?
                .map_or(0, |min| min - SORT_GAP),
        };

        Ok(index)
    }

    /// Move `displayed[from]` to position `to` and persist the result
    pub async fn reorder(&self, displayed: &[Action], from: usize, to: usize) -> Result<ReorderOutcome> {
        match plan_reorder(displayed, from, to) {
            ReorderPlan::Unchanged => Ok(ReorderOutcome::Unchanged),
            ReorderPlan::Move { id, sort_index } => {
                self.repo.update_sort_index(id, sort_index).await?;
                Ok(ReorderOutcome::Moved { id, sort_index })
            }
            ReorderPlan::Rebalance { list, ids } => {
                self.repo.apply_sort_order(&ids).await?;
                tracing::info!("Rebalanced partition {:?} while reordering", list);
                Ok(ReorderOutcome::Rebalanced { list })
            }
        }
    }

    /// Renumber a partition in its current order
    pub async fn rebalance(&self, list: Option<ActionList>) -> Result<usize> {
        self.repo.rebalance_partition(list).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::{create_test_repo, new_action};

    async fn insert(repo: &Repository, ordering: &OrderingService, title: &str, list: Option<ActionList>) -> Action {
        let index = ordering.sort_index_for_new(list).await.unwrap();
        repo.insert_action(new_action(title, list, index)).await.unwrap()
    }

    fn indices(actions: &[Action]) -> Vec<i64> {
        actions.iter().map(|a| a.sort_index).collect()
    }

    fn titles(actions: &[Action]) -> Vec<&str> {
        actions.iter().map(|a| a.title.as_str()).collect()
    }

    #[test]
    fn test_midpoint_floors() {
        assert_eq!(midpoint(0, 1000), 500);
        assert_eq!(midpoint(-1000, 0), -500);
        assert_eq!(midpoint(0, -3), -2);
        assert_eq!(midpoint(4, 7), 5);
    }

    #[test]
    fn test_needs_rebalance() {
        assert!(needs_rebalance(5, 6));
        assert!(needs_rebalance(6, 5));
        assert!(needs_rebalance(3, 3));
        assert!(!needs_rebalance(5, 7));
    }

    #[tokio::test]
    async fn test_new_action_placement() {
        let repo = create_test_repo().await;
        let ordering = OrderingService::new(repo.clone());

        let a = insert(&repo, &ordering, "A", None).await;
        let b = insert(&repo, &ordering, "B", None).await;
        assert_eq!(a.sort_index, 0);
        assert_eq!(b.sort_index, -1000);

        let p1 = insert(&repo, &ordering, "P1", Some(ActionList::Pro)).await;
        let p2 = insert(&repo, &ordering, "P2", Some(ActionList::Pro)).await;
        assert_eq!(p1.sort_index, 0);
        assert_eq!(p2.sort_index, 1000);
    }

    #[tokio::test]
    async fn test_move_unlisted_to_tail() {
        let repo = create_test_repo().await;
        let ordering = OrderingService::new(repo.clone());
        insert(&repo, &ordering, "A", None).await;
        let b = insert(&repo, &ordering, "B", None).await;

        let displayed = repo.list_active_in(None).await.unwrap();
        assert_eq!(titles(&displayed), vec!["B", "A"]);

        let outcome = ordering.reorder(&displayed, 0, 1).await.unwrap();
        assert_eq!(
            outcome,
            ReorderOutcome::Moved {
                id: b.id,
                sort_index: 1000
            }
        );

        let reloaded = repo.list_active_in(None).await.unwrap();
        assert_eq!(titles(&reloaded), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_move_between_uses_midpoint() {
        let repo = create_test_repo().await;
        let ordering = OrderingService::new(repo.clone());
        for title in ["A", "B", "C"] {
            insert(&repo, &ordering, title, Some(ActionList::Perso)).await;
        }

        let displayed = repo.list_active_in(Some(ActionList::Perso)).await.unwrap();
        let outcome = ordering.reorder(&displayed, 2, 1).await.unwrap();
        assert_eq!(
            outcome,
            ReorderOutcome::Moved {
                id: displayed[2].id,
                sort_index: 500
            }
        );

        let reloaded = repo.list_active_in(Some(ActionList::Perso)).await.unwrap();
        assert_eq!(titles(&reloaded), vec!["A", "C", "B"]);
        assert_eq!(indices(&reloaded), vec![0, 500, 1000]);
    }

    #[tokio::test]
    async fn test_adjacent_neighbours_force_rebalance() {
        let repo = create_test_repo().await;
        let ordering = OrderingService::new(repo.clone());
        let list = Some(ActionList::Pro);
        for (title, index) in [("A", 5), ("B", 6), ("C", 10)] {
            repo.insert_action(new_action(title, list, index)).await.unwrap();
        }

        let displayed = repo.list_active_in(list).await.unwrap();
        let outcome = ordering.reorder(&displayed, 2, 1).await.unwrap();
        assert_eq!(outcome, ReorderOutcome::Rebalanced { list });

        let reloaded = repo.list_active_in(list).await.unwrap();
        assert_eq!(titles(&reloaded), vec!["A", "C", "B"]);
        assert_eq!(indices(&reloaded), vec![0, 1000, 2000]);
    }

    #[tokio::test]
    async fn test_filtered_view_only_counts_same_partition() {
        let repo = create_test_repo().await;
        let ordering = OrderingService::new(repo.clone());
        insert(&repo, &ordering, "P1", Some(ActionList::Perso)).await;
        insert(&repo, &ordering, "X1", Some(ActionList::Pro)).await;
        insert(&repo, &ordering, "P2", Some(ActionList::Perso)).await;

        // Mixed view: P1, P2, X1 by sort index then id
        let displayed = repo.list_active().await.unwrap();
        assert_eq!(titles(&displayed), vec!["P1", "X1", "P2"]);

        // Dropping X1 at the end: no Pro neighbour left or right
        assert_eq!(
            ordering.reorder(&displayed, 1, 2).await.unwrap(),
            ReorderOutcome::Unchanged
        );

        // Dropping P2 first: P1 becomes its only (following) neighbour
        let outcome = ordering.reorder(&displayed, 2, 0).await.unwrap();
        assert_eq!(
            outcome,
            ReorderOutcome::Moved {
                id: displayed[2].id,
                sort_index: -1000
            }
        );
    }

    #[tokio::test]
    async fn test_out_of_range_is_unchanged() {
        let repo = create_test_repo().await;
        let ordering = OrderingService::new(repo.clone());
        insert(&repo, &ordering, "A", None).await;

        let displayed = repo.list_active().await.unwrap();
        assert_eq!(ordering.reorder(&displayed, 0, 0).await.unwrap(), ReorderOutcome::Unchanged);
        assert_eq!(ordering.reorder(&displayed, 0, 5).await.unwrap(), ReorderOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_rebalance_is_idempotent() {
        let repo = create_test_repo().await;
        let ordering = OrderingService::new(repo.clone());
        let list = Some(ActionList::Perso);
        for (title, index) in [("A", -7), ("B", 3), ("C", 4)] {
            repo.insert_action(new_action(title, list, index)).await.unwrap();
        }

        assert_eq!(ordering.rebalance(list).await.unwrap(), 3);
        let once = repo.list_active_in(list).await.unwrap();
        ordering.rebalance(list).await.unwrap();
        let twice = repo.list_active_in(list).await.unwrap();

        assert_eq!(indices(&once), vec![0, 1000, 2000]);
        assert_eq!(indices(&once), indices(&twice));
        assert_eq!(titles(&twice), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_repeated_moves_stay_strictly_increasing() {
        let repo = create_test_repo().await;
        let ordering = OrderingService::new(repo.clone());
        let list = Some(ActionList::Pro);
        for title in ["A", "B", "C", "D", "E"] {
            insert(&repo, &ordering, title, list).await;
        }

        let mut expected = vec!["A", "B", "C", "D", "E"];
        // Repeatedly drag the last item to position 1 so the gap keeps halving
        for _ in 0..15 {
            let displayed = repo.list_active_in(list).await.unwrap();
            ordering.reorder(&displayed, 4, 1).await.unwrap();

            let moved = expected.remove(4);
            expected.insert(1, moved);

            let reloaded = repo.list_active_in(list).await.unwrap();
            assert_eq!(titles(&reloaded), expected);
            assert!(reloaded.windows(2).all(|w| w[0].sort_index < w[1].sort_index));
        }
    }
}
