use anyhow::Result;
use shared::{
    domain::{Item, ItemId},
    protocol::{CommitKey, ItemUpdate},
};

use crate::{
    board::ItemBoard,
    drag::{DragSession, DropTarget, NoOpReason},
    error::{EditorError, EditorResult},
    lock::LockGate,
    registry::TierRegistry,
    store::RecordStore,
};

/// A drop that will change something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChange {
    /// Zone drop into another tier. The stored position is carried over.
    CrossTier {
        item_id: ItemId,
        from_tier: String,
        to_tier: String,
        position: u32,
    },
    /// Item dropped onto a sibling in the same tier.
    Reorder {
        item_id: ItemId,
        tier: String,
        from_index: usize,
        to_index: usize,
    },
}

impl PlannedChange {
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::CrossTier { item_id, .. } | Self::Reorder { item_id, .. } => *item_id,
        }
    }

    /// Destination identity used to debounce repeated drops.
    pub fn commit_key(&self) -> CommitKey {
        match self {
            Self::CrossTier {
                item_id,
                to_tier,
                position,
                ..
            } => CommitKey {
                item_id: *item_id,
                tier: to_tier.clone(),
                position: *position,
            },
            Self::Reorder {
                item_id,
                tier,
                to_index,
                ..
            } => CommitKey {
                item_id: *item_id,
                tier: tier.clone(),
                position: *to_index as u32,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Change(PlannedChange),
    NoOp(NoOpReason),
}

/// Writes needed to persist an applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    ItemTier { item_id: ItemId, tier: String },
    ItemPositions(Vec<Item>),
}

impl PendingWrite {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::ItemPositions(items) if items.is_empty())
    }

    pub async fn persist(&self, store: &dyn RecordStore) -> Result<()> {
        match self {
            Self::ItemTier { item_id, tier } => {
                store
                    .update_item(*item_id, &ItemUpdate::tier(tier.clone()))
                    .await
            }
            Self::ItemPositions(items) if items.is_empty() => Ok(()),
            Self::ItemPositions(items) => store.upsert_items(items).await,
        }
    }
}

/// Result of a finished drop, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Moved {
        item_id: ItemId,
        from_tier: String,
        to_tier: String,
    },
    Reordered {
        item_id: ItemId,
        tier: String,
        written: usize,
    },
    Skipped(NoOpReason),
}

/// Decides what a drop of `session` onto `target` means, without touching
/// any state.
pub fn plan(
    gate: &LockGate,
    board: &ItemBoard,
    registry: &TierRegistry,
    session: &DragSession,
    target: &DropTarget,
) -> EditorResult<Plan> {
    gate.ensure_unlocked()?;
    let Some(dragged) = board.get(session.item_id) else {
        return Ok(Plan::NoOp(NoOpReason::UnknownItem));
    };

    match target {
        DropTarget::TierZone(tier) => {
            if !registry.contains(tier) {
                return Ok(Plan::NoOp(NoOpReason::UnknownTier));
            }
            if dragged.tier == *tier {
                return Ok(Plan::NoOp(NoOpReason::SameTier));
            }
            Ok(Plan::Change(PlannedChange::CrossTier {
                item_id: dragged.id,
                from_tier: dragged.tier.clone(),
                to_tier: tier.clone(),
                position: dragged.position,
            }))
        }
        DropTarget::Item(over_id) => {
            if *over_id == dragged.id {
                return Ok(Plan::NoOp(NoOpReason::SameItem));
            }
            let Some(over) = board.get(*over_id) else {
                return Ok(Plan::NoOp(NoOpReason::UnknownItem));
            };
            if over.tier != dragged.tier {
                return Ok(Plan::NoOp(NoOpReason::CrossTierItemDrop));
            }
            let (Some(from_index), Some(to_index)) =
                (board.index_of(dragged.id), board.index_of(over.id))
            else {
                return Ok(Plan::NoOp(NoOpReason::UnknownItem));
            };
            if from_index == to_index {
                return Ok(Plan::NoOp(NoOpReason::SamePosition));
            }
            Ok(Plan::Change(PlannedChange::Reorder {
                item_id: dragged.id,
                tier: dragged.tier.clone(),
                from_index,
                to_index,
            }))
        }
    }
}

/// Applies `change` to the local board and returns the writes that persist it.
pub fn apply(
    gate: &LockGate,
    board: &mut ItemBoard,
    change: &PlannedChange,
) -> EditorResult<PendingWrite> {
    gate.ensure_unlocked()?;
    match change {
        PlannedChange::CrossTier {
            item_id, to_tier, ..
        } => {
            let mut item = board
                .get(*item_id)
                .cloned()
                .ok_or_else(|| EditorError::NotFound(format!("item {item_id}")))?;
            item.tier = to_tier.clone();
            board.replace(item);
            Ok(PendingWrite::ItemTier {
                item_id: *item_id,
                tier: to_tier.clone(),
            })
        }
        PlannedChange::Reorder {
            item_id,
            tier,
            from_index,
            to_index,
        } => {
            if !board.move_within(tier, *from_index, *to_index) {
                return Err(EditorError::NotFound(format!(
                    "item {item_id} at index {from_index} of tier '{tier}'"
                )));
            }
            Ok(PendingWrite::ItemPositions(board.normalize_tier(tier)))
        }
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
