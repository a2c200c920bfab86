use std::time::Instant;

use super::*;
use crate::test_support::{item, tier, titles};

fn fixture() -> (ItemBoard, TierRegistry) {
    let board = ItemBoard::from_items(vec![
        item(1, "a", "S", 0),
        item(2, "b", "S", 1),
        item(3, "c", "S", 2),
        item(4, "x", "A", 0),
        item(5, "y", "B", 1),
    ]);
    let registry = TierRegistry::from_tiers(vec![tier(10, "S", 0), tier(11, "A", 1), tier(12, "B", 2)]);
    (board, registry)
}

fn session_for(board: &ItemBoard, item_id: i64) -> DragSession {
    let dragged = board.get(ItemId(item_id)).expect("item");
    DragSession {
        item_id: dragged.id,
        tier: dragged.tier.clone(),
        position: dragged.position,
        started_at: Instant::now(),
    }
}

#[test]
fn zone_drop_into_other_tier_keeps_position() {
    let (mut board, registry) = fixture();
    let gate = LockGate::default();
    let plan = plan(&gate, &board, &registry, &session_for(&board, 5), &DropTarget::zone("A"))
        .expect("plan");
    let Plan::Change(change) = plan else {
        panic!("expected a change, got {plan:?}");
    };
    assert_eq!(
        change,
        PlannedChange::CrossTier {
            item_id: ItemId(5),
            from_tier: "B".into(),
            to_tier: "A".into(),
            position: 1,
        }
    );

    let write = apply(&gate, &mut board, &change).expect("apply");
    assert_eq!(
        write,
        PendingWrite::ItemTier {
            item_id: ItemId(5),
            tier: "A".into()
        }
    );
    assert_eq!(titles(board.items_in("A")), vec!["x", "y"]);
    assert!(board.items_in("B").is_empty());
    assert_eq!(board.get(ItemId(5)).expect("y").position, 1);
}

#[test]
fn zone_drop_on_own_or_unknown_tier_is_a_no_op() {
    let (board, registry) = fixture();
    let gate = LockGate::default();
    let session = session_for(&board, 1);
    assert_eq!(
        plan(&gate, &board, &registry, &session, &DropTarget::zone("S")).expect("plan"),
        Plan::NoOp(NoOpReason::SameTier)
    );
    assert_eq!(
        plan(&gate, &board, &registry, &session, &DropTarget::zone("Z")).expect("plan"),
        Plan::NoOp(NoOpReason::UnknownTier)
    );
}

#[test]
fn item_drop_reorders_and_writes_changed_positions() {
    let (mut board, registry) = fixture();
    let gate = LockGate::default();
    let plan = plan(
        &gate,
        &board,
        &registry,
        &session_for(&board, 3),
        &DropTarget::Item(ItemId(1)),
    )
    .expect("plan");
    let Plan::Change(change) = plan else {
        panic!("expected a change, got {plan:?}");
    };
    assert_eq!(
        change.commit_key(),
        CommitKey {
            item_id: ItemId(3),
            tier: "S".into(),
            position: 0,
        }
    );

    let PendingWrite::ItemPositions(written) = apply(&gate, &mut board, &change).expect("apply")
    else {
        panic!("expected position writes");
    };
    assert_eq!(titles(board.items_in("S")), vec!["c", "a", "b"]);
    let positions: Vec<_> = board.items_in("S").iter().map(|i| i.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(written.len(), 3);
}

#[test]
fn self_drop_and_cross_tier_item_drop_are_no_ops() {
    let (board, registry) = fixture();
    let gate = LockGate::default();
    let session = session_for(&board, 1);
    assert_eq!(
        plan(&gate, &board, &registry, &session, &DropTarget::Item(ItemId(1))).expect("plan"),
        Plan::NoOp(NoOpReason::SameItem)
    );
    assert_eq!(
        plan(&gate, &board, &registry, &session, &DropTarget::Item(ItemId(4))).expect("plan"),
        Plan::NoOp(NoOpReason::CrossTierItemDrop)
    );
    assert_eq!(
        plan(&gate, &board, &registry, &session, &DropTarget::Item(ItemId(99))).expect("plan"),
        Plan::NoOp(NoOpReason::UnknownItem)
    );
}

#[test]
fn locked_gate_blocks_plan_and_apply() {
    let (mut board, registry) = fixture();
    let locked = LockGate::new(true);
    let session = session_for(&board, 3);
    assert_eq!(
        plan(&locked, &board, &registry, &session, &DropTarget::Item(ItemId(1))),
        Err(EditorError::Locked)
    );
    let change = PlannedChange::Reorder {
        item_id: ItemId(3),
        tier: "S".into(),
        from_index: 2,
        to_index: 0,
    };
    assert_eq!(apply(&locked, &mut board, &change), Err(EditorError::Locked));
    assert_eq!(titles(board.items_in("S")), vec!["a", "b", "c"]);
}
