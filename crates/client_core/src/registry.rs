use shared::{
    domain::{Tier, TierColor, TierId},
    protocol::NewTier,
};

use crate::{
    error::{EditorError, EditorResult},
    lock::LockGate,
    ordering, validate,
};

/// Ordered tiers of one list. Every mutation checks the lock gate itself, so
/// callers cannot bypass it by talking to the registry directly.
#[derive(Debug, Clone, Default)]
pub struct TierRegistry {
    tiers: Vec<Tier>,
}

impl TierRegistry {
    pub fn from_tiers(mut tiers: Vec<Tier>) -> Self {
        tiers.sort_by_key(|tier| (tier.position, tier.id));
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.tiers.iter().position(|tier| tier.name == name)
    }

    pub fn first(&self) -> Option<&Tier> {
        self.tiers.first()
    }

    /// Checks a new tier and returns the record to insert. The tier is
    /// appended at `position = tier count`; colors default to gray.
    pub fn validate_new(
        &self,
        gate: &LockGate,
        name: &str,
        color: Option<TierColor>,
    ) -> EditorResult<NewTier> {
        gate.ensure_unlocked()?;
        let name = validate::tier_name(name)?;
        if self.contains(&name) {
            return Err(EditorError::validation(format!(
                "tier '{name}' already exists"
            )));
        }
        let color = color.unwrap_or_default();
        ensure_palette(&color)?;
        Ok(NewTier {
            name,
            position: self.tiers.len() as u32,
            color,
        })
    }

    pub fn insert(&mut self, tier: Tier) {
        self.tiers.push(tier);
    }

    /// Guards deletion: the tier must exist, hold no items, and not be the
    /// only tier left.
    pub fn check_delete(
        &self,
        gate: &LockGate,
        name: &str,
        item_count: usize,
    ) -> EditorResult<&Tier> {
        gate.ensure_unlocked()?;
        let tier = self
            .get(name)
            .ok_or_else(|| EditorError::NotFound(format!("tier '{name}'")))?;
        if item_count > 0 {
            return Err(EditorError::TierNotEmpty {
                tier: name.to_string(),
                item_count,
            });
        }
        if self.tiers.len() <= 1 {
            return Err(EditorError::LastTier);
        }
        Ok(tier)
    }

    /// Drops the tier and renumbers the rest, returning the renumbered ones.
    pub fn remove(&mut self, name: &str) -> Vec<Tier> {
        let Some(index) = self.index_of(name) else {
            return Vec::new();
        };
        self.tiers.remove(index);
        ordering::normalize(&mut self.tiers)
    }

    /// Moves the tier at `from` to `to` and renumbers. Returns the full tier
    /// set to persist, or `None` when nothing moved.
    pub fn reorder(
        &mut self,
        gate: &LockGate,
        from: usize,
        to: usize,
    ) -> EditorResult<Option<Vec<Tier>>> {
        gate.ensure_unlocked()?;
        if !ordering::move_index(&mut self.tiers, from, to) {
            return Ok(None);
        }
        ordering::normalize(&mut self.tiers);
        Ok(Some(self.tiers.clone()))
    }

    /// Drag-a-tier-onto-a-tier form of [`TierRegistry::reorder`].
    pub fn reorder_by_name(
        &mut self,
        gate: &LockGate,
        dragged: &str,
        target: &str,
    ) -> EditorResult<Option<Vec<Tier>>> {
        gate.ensure_unlocked()?;
        let from = self
            .index_of(dragged)
            .ok_or_else(|| EditorError::NotFound(format!("tier '{dragged}'")))?;
        let to = self
            .index_of(target)
            .ok_or_else(|| EditorError::NotFound(format!("tier '{target}'")))?;
        self.reorder(gate, from, to)
    }

    pub fn check_recolor(
        &self,
        gate: &LockGate,
        name: &str,
        color: &TierColor,
    ) -> EditorResult<TierId> {
        gate.ensure_unlocked()?;
        ensure_palette(color)?;
        self.get(name)
            .map(|tier| tier.id)
            .ok_or_else(|| EditorError::NotFound(format!("tier '{name}'")))
    }

    pub fn set_color(&mut self, name: &str, color: &TierColor) -> bool {
        match self.tiers.iter_mut().find(|tier| tier.name == name) {
            Some(tier) => {
                tier.color_from = color.from.clone();
                tier.color_to = color.to.clone();
                true
            }
            None => false,
        }
    }

    pub fn normalize(&mut self) -> Vec<Tier> {
        ordering::normalize(&mut self.tiers)
    }
}

fn ensure_palette(color: &TierColor) -> EditorResult<()> {
    if !color.is_in_palette() {
        return Err(EditorError::validation(format!(
            "unknown color pair {} -> {}",
            color.from, color.to
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
