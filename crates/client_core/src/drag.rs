use std::time::{Duration, Instant};

use shared::{
    domain::{Item, ItemId},
    protocol::CommitKey,
};

use crate::{
    board::ItemBoard,
    error::EditorResult,
    lock::LockGate,
};

pub const DEFAULT_COMMIT_DEBOUNCE: Duration = Duration::from_millis(300);

/// What the pointer is over when a drag is hovered or released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// A tier's container, addressed by tier name.
    TierZone(String),
    /// Another item card.
    Item(ItemId),
}

impl DropTarget {
    pub fn zone(tier: impl Into<String>) -> Self {
        Self::TierZone(tier.into())
    }
}

/// Where the dragged item was when it was lifted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub item_id: ItemId,
    pub tier: String,
    pub position: u32,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        session: DragSession,
        active_tier: Option<String>,
    },
    Committing {
        session: DragSession,
        target: DropTarget,
    },
}

/// Why a drop produced no writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    NotDragging,
    NoTarget,
    UnknownItem,
    UnknownTier,
    SameTier,
    SameItem,
    SamePosition,
    CrossTierItemDrop,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStart {
    Ready {
        session: DragSession,
        target: DropTarget,
    },
    Skipped(NoOpReason),
}

#[derive(Debug, Clone)]
struct AppliedCommit {
    key: CommitKey,
    applied_at: Instant,
}

/// Drag state machine: `Idle -> Dragging -> Committing -> Idle`.
///
/// The last applied commit outlives individual sessions so that a repeated
/// drop of the same item onto the same slot inside the debounce window is
/// rejected.
#[derive(Debug, Clone)]
pub struct DragSessionTracker {
    state: DragState,
    last_commit: Option<AppliedCommit>,
    debounce: Duration,
}

impl Default for DragSessionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COMMIT_DEBOUNCE)
    }
}

impl DragSessionTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: DragState::Idle,
            last_commit: None,
            debounce,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn dragging_item(&self) -> Option<ItemId> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging { session, .. } | DragState::Committing { session, .. } => {
                Some(session.item_id)
            }
        }
    }

    pub fn active_tier(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { active_tier, .. } => active_tier.as_deref(),
            _ => None,
        }
    }

    /// Lifts `item`. A drag already in progress is replaced.
    pub fn pick_up(
        &mut self,
        gate: &LockGate,
        item: &Item,
        now: Instant,
    ) -> EditorResult<DragSession> {
        if let Err(err) = gate.ensure_unlocked() {
            self.state = DragState::Idle;
            return Err(err);
        }
        let session = DragSession {
            item_id: item.id,
            tier: item.tier.clone(),
            position: item.position,
            started_at: now,
        };
        self.state = DragState::Dragging {
            session: session.clone(),
            active_tier: None,
        };
        Ok(session)
    }

    /// Updates the highlighted tier. Returns whether anything changed.
    pub fn hover(&mut self, target: Option<&DropTarget>, board: &ItemBoard) -> bool {
        let DragState::Dragging { active_tier, .. } = &mut self.state else {
            return false;
        };
        let next = match target {
            Some(DropTarget::TierZone(tier)) => Some(tier.clone()),
            Some(DropTarget::Item(item_id)) => match board.tier_of(*item_id) {
                Some(tier) => Some(tier.to_string()),
                None => return false,
            },
            None => None,
        };
        if *active_tier == next {
            return false;
        }
        *active_tier = next;
        true
    }

    /// Releases the drag. A locked list drops the session and fails.
    pub fn begin_commit(
        &mut self,
        gate: &LockGate,
        target: Option<DropTarget>,
    ) -> EditorResult<CommitStart> {
        let session = match &self.state {
            DragState::Dragging { session, .. } => session.clone(),
            _ => return Ok(CommitStart::Skipped(NoOpReason::NotDragging)),
        };
        if let Err(err) = gate.ensure_unlocked() {
            self.state = DragState::Idle;
            return Err(err);
        }
        let Some(target) = target else {
            self.state = DragState::Idle;
            return Ok(CommitStart::Skipped(NoOpReason::NoTarget));
        };
        self.state = DragState::Committing {
            session: session.clone(),
            target: target.clone(),
        };
        Ok(CommitStart::Ready { session, target })
    }

    /// Records `key` as applied unless it repeats the last commit within the
    /// debounce window.
    pub fn admit(&mut self, key: CommitKey, now: Instant) -> bool {
        if let Some(last) = &self.last_commit {
            let elapsed = now.saturating_duration_since(last.applied_at);
            if last.key == key && elapsed < self.debounce {
                return false;
            }
        }
        self.last_commit = Some(AppliedCommit {
            key,
            applied_at: now,
        });
        true
    }

    /// Drops the record of `key` when its write was rolled back.
    pub fn forget(&mut self, key: &CommitKey) {
        if self.last_commit.as_ref().is_some_and(|last| &last.key == key) {
            self.last_commit = None;
        }
    }

    pub fn finish(&mut self) {
        self.state = DragState::Idle;
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
#[path = "tests/drag_tests.rs"]
mod tests;
