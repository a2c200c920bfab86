pub mod auth;
pub mod board;
pub mod directory;
pub mod drag;
pub mod editor;
pub mod error;
pub mod lock;
pub mod ordering;
pub mod reconcile;
pub mod registry;
pub mod session;
pub mod store;
pub mod validate;

pub use auth::{AuthProvider, MissingAuthProvider, StorageAuthProvider};
pub use drag::{DragSessionTracker, DropTarget, NoOpReason, DEFAULT_COMMIT_DEBOUNCE};
pub use editor::{
    EditorConfig, EditorEvent, EditorSnapshot, ItemDraft, ItemEdit, TierListEditor, TierView,
};
pub use error::{EditorError, EditorResult};
pub use reconcile::CommitOutcome;
pub use session::{SessionSnapshot, SessionStore};
pub use store::{MissingRecordStore, RecordStore};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
