use shared::domain::TierList;
use tracing::info;

use crate::{
    auth::{require_identity, AuthProvider},
    error::{EditorError, EditorResult},
    store::RecordStore,
    validate,
};

/// Creates an empty list owned by the signed-in user.
pub async fn create_list(
    store: &dyn RecordStore,
    auth: &dyn AuthProvider,
    title: &str,
) -> EditorResult<TierList> {
    let identity = require_identity(auth, "create a tier list").await?;
    let title = validate::list_title(title)?;
    let list = store
        .insert_list(identity.user_id, &title)
        .await
        .map_err(|err| EditorError::store(&err))?;
    info!(
        list_id = list.id.0,
        owner = identity.user_id.0,
        "directory: created list"
    );
    Ok(list)
}

/// The signed-in user's lists, newest first.
pub async fn list_lists(
    store: &dyn RecordStore,
    auth: &dyn AuthProvider,
) -> EditorResult<Vec<TierList>> {
    let identity = require_identity(auth, "view your tier lists").await?;
    let mut lists = store
        .select_lists_for_owner(identity.user_id)
        .await
        .map_err(|err| EditorError::store(&err))?;
    lists.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(lists)
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;
