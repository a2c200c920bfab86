use std::collections::HashMap;

use shared::domain::{Item, ItemId};

use crate::ordering;

/// Items grouped by tier name, each group kept in display order.
#[derive(Debug, Clone, Default)]
pub struct ItemBoard {
    tiers: HashMap<String, Vec<Item>>,
    locations: HashMap<ItemId, String>,
}

impl ItemBoard {
    /// Groups `items` by tier and orders each group by `(position, id)`.
    /// Positions are left untouched; see [`ItemBoard::normalize_all`].
    pub fn from_items(items: Vec<Item>) -> Self {
        let mut board = Self::default();
        for item in items {
            board.locations.insert(item.id, item.tier.clone());
            board.tiers.entry(item.tier.clone()).or_default().push(item);
        }
        for group in board.tiers.values_mut() {
            group.sort_by_key(|item| (item.position, item.id));
        }
        board
    }

    pub fn get(&self, item_id: ItemId) -> Option<&Item> {
        let tier = self.locations.get(&item_id)?;
        self.tiers
            .get(tier)?
            .iter()
            .find(|item| item.id == item_id)
    }

    pub fn tier_of(&self, item_id: ItemId) -> Option<&str> {
        self.locations.get(&item_id).map(String::as_str)
    }

    pub fn index_of(&self, item_id: ItemId) -> Option<usize> {
        let tier = self.locations.get(&item_id)?;
        self.tiers
            .get(tier)?
            .iter()
            .position(|item| item.id == item_id)
    }

    pub fn items_in(&self, tier: &str) -> &[Item] {
        self.tiers.get(tier).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn count_in(&self, tier: &str) -> usize {
        self.items_in(tier).len()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Appends to the end of the item's tier, keeping its stored position.
    pub fn insert(&mut self, item: Item) {
        self.locations.insert(item.id, item.tier.clone());
        self.tiers.entry(item.tier.clone()).or_default().push(item);
    }

    pub fn remove(&mut self, item_id: ItemId) -> Option<Item> {
        let tier = self.locations.remove(&item_id)?;
        let group = self.tiers.get_mut(&tier)?;
        let index = group.iter().position(|item| item.id == item_id)?;
        let removed = group.remove(index);
        if group.is_empty() {
            self.tiers.remove(&tier);
        }
        Some(removed)
    }

    /// Overwrites an item in place. A changed tier moves it to the end of the
    /// new tier's sequence.
    pub fn replace(&mut self, item: Item) -> bool {
        let Some(current_tier) = self.locations.get(&item.id).cloned() else {
            return false;
        };
        if current_tier == item.tier {
            if let Some(slot) = self
                .tiers
                .get_mut(&current_tier)
                .and_then(|group| group.iter_mut().find(|slot| slot.id == item.id))
            {
                *slot = item;
                return true;
            }
            return false;
        }
        self.remove(item.id);
        self.insert(item);
        true
    }

    /// Moves the item at `from` to `to` within one tier.
    pub fn move_within(&mut self, tier: &str, from: usize, to: usize) -> bool {
        match self.tiers.get_mut(tier) {
            Some(group) => ordering::move_index(group, from, to),
            None => false,
        }
    }

    /// Renumbers one tier densely and returns the items whose position changed.
    pub fn normalize_tier(&mut self, tier: &str) -> Vec<Item> {
        match self.tiers.get_mut(tier) {
            Some(group) => ordering::normalize(group),
            None => Vec::new(),
        }
    }

    /// Renumbers every tier, returning drifted items grouped per tier.
    pub fn normalize_all(&mut self) -> Vec<(String, Vec<Item>)> {
        let mut names: Vec<String> = self.tiers.keys().cloned().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| {
                let changed = self.normalize_tier(&name);
                (!changed.is_empty()).then_some((name, changed))
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
