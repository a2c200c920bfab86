use crate::error::{EditorError, EditorResult};

/// The per-list "completed" flag. Every structural mutation asks the gate first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockGate {
    completed: bool,
}

impl LockGate {
    pub fn new(completed: bool) -> Self {
        Self { completed }
    }

    pub fn is_locked(&self) -> bool {
        self.completed
    }

    pub fn ensure_unlocked(&self) -> EditorResult<()> {
        if self.completed {
            return Err(EditorError::Locked);
        }
        Ok(())
    }

    pub(crate) fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }
}
