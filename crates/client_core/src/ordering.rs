//! Dense zero-based ordering shared by items (grouped by tier) and tiers
//! (grouped by list).

use shared::domain::{Item, Tier};

pub trait Positioned {
    fn position(&self) -> u32;
    fn set_position(&mut self, position: u32);
}

impl Positioned for Item {
    fn position(&self) -> u32 {
        self.position
    }

    fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}

impl Positioned for Tier {
    fn position(&self) -> u32 {
        self.position
    }

    fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}

/// Assigns `position = index` over `group` and returns the members whose
/// position changed. Callers decide which of those to write.
pub fn normalize<T: Positioned + Clone>(group: &mut [T]) -> Vec<T> {
    let mut changed = Vec::new();
    for (index, member) in group.iter_mut().enumerate() {
        let index = index as u32;
        if member.position() != index {
            member.set_position(index);
            changed.push(member.clone());
        }
    }
    changed
}

/// Removes the element at `from` and reinserts it at `to`.
///
/// Returns `false` without touching `seq` when the indices are equal or out of range.
pub fn move_index<T>(seq: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from == to || from >= seq.len() || to >= seq.len() {
        return false;
    }
    let moved = seq.remove(from);
    seq.insert(to, moved);
    true
}

/// True when the positions, sorted, are exactly `0..k`.
pub fn is_dense(positions: impl IntoIterator<Item = u32>) -> bool {
    let mut positions: Vec<u32> = positions.into_iter().collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(index, position)| *position == index as u32)
}

#[cfg(test)]
#[path = "tests/ordering_tests.rs"]
mod tests;
