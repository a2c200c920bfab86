use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use serde::Serialize;
use shared::{
    domain::{Item, ItemId, ListId, Tier, TierColor, TierList},
    protocol::{ItemUpdate, NewItem},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    auth::{require_identity, AuthProvider},
    board::ItemBoard,
    drag::{
        CommitStart, DragSession, DragSessionTracker, DropTarget, NoOpReason,
        DEFAULT_COMMIT_DEBOUNCE,
    },
    error::{EditorError, EditorResult},
    lock::LockGate,
    reconcile::{self, CommitOutcome, Plan, PlannedChange},
    registry::TierRegistry,
    store::RecordStore,
    validate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorConfig {
    pub commit_debounce: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            commit_debounce: DEFAULT_COMMIT_DEBOUNCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    Reloaded,
    ItemsChanged,
    TiersChanged,
    LockChanged { is_completed: bool },
    Error(String),
}

/// Input for a new item. `tier` defaults to the first tier.
#[derive(Debug, Clone, Default)]
pub struct ItemDraft {
    pub title: String,
    pub image_url: Option<String>,
    pub tier: Option<String>,
}

/// Partial edit of an item. A blank `image_url` clears the image.
#[derive(Debug, Clone, Default)]
pub struct ItemEdit {
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub tier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierView {
    pub tier: Tier,
    pub items: Vec<Item>,
}

/// Everything a page needs to render one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorSnapshot {
    pub list_id: ListId,
    pub title: String,
    pub is_completed: bool,
    pub tiers: Vec<TierView>,
    pub active_tier: Option<String>,
    pub dragging: Option<ItemId>,
}

impl EditorSnapshot {
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|view| view.tier.name.as_str()).collect()
    }

    pub fn items_in(&self, tier: &str) -> &[Item] {
        self.tiers
            .iter()
            .find(|view| view.tier.name == tier)
            .map(|view| view.items.as_slice())
            .unwrap_or_default()
    }

    pub fn item_titles_in(&self, tier: &str) -> Vec<&str> {
        self.items_in(tier)
            .iter()
            .map(|item| item.title.as_str())
            .collect()
    }
}

struct EditorState {
    list: TierList,
    gate: LockGate,
    registry: TierRegistry,
    board: ItemBoard,
    drag: DragSessionTracker,
}

/// One open tier list: local view plus every mutation entry point.
pub struct TierListEditor {
    list_id: ListId,
    store: Arc<dyn RecordStore>,
    auth: Arc<dyn AuthProvider>,
    state: Mutex<EditorState>,
    events: broadcast::Sender<EditorEvent>,
}

impl TierListEditor {
    pub async fn open(
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthProvider>,
        list_id: ListId,
    ) -> EditorResult<Self> {
        Self::open_with_config(store, auth, list_id, EditorConfig::default()).await
    }

    pub async fn open_with_config(
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthProvider>,
        list_id: ListId,
        config: EditorConfig,
    ) -> EditorResult<Self> {
        let identity = require_identity(auth.as_ref(), "open a tier list").await?;
        let list = store
            .select_list(list_id)
            .await
            .map_err(|err| EditorError::store(&err))?
            .filter(|list| list.owner_id == identity.user_id)
            .ok_or_else(|| EditorError::NotFound(format!("tier list {list_id}")))?;
        let (tiers, items) = fetch_contents(store.as_ref(), list_id).await?;

        let (events, _) = broadcast::channel(256);
        let editor = Self {
            list_id,
            store,
            auth,
            state: Mutex::new(EditorState {
                gate: LockGate::new(list.is_completed),
                list,
                registry: TierRegistry::from_tiers(tiers),
                board: ItemBoard::from_items(items),
                drag: DragSessionTracker::new(config.commit_debounce),
            }),
            events,
        };
        {
            let mut state = editor.state.lock().await;
            editor.renormalize(&mut state).await;
            info!(
                list_id = list_id.0,
                tiers = state.registry.len(),
                items = state.board.len(),
                "editor: opened list"
            );
        }
        Ok(editor)
    }

    pub fn list_id(&self) -> ListId {
        self.list_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> EditorSnapshot {
        let state = self.state.lock().await;
        EditorSnapshot {
            list_id: self.list_id,
            title: state.list.title.clone(),
            is_completed: state.gate.is_locked(),
            tiers: state
                .registry
                .tiers()
                .iter()
                .map(|tier| TierView {
                    tier: tier.clone(),
                    items: state.board.items_in(&tier.name).to_vec(),
                })
                .collect(),
            active_tier: state.drag.active_tier().map(str::to_string),
            dragging: state.drag.dragging_item(),
        }
    }

    /// Discards local state and reloads the list from the store.
    pub async fn reload(&self) -> EditorResult<()> {
        require_identity(self.auth.as_ref(), "reload the tier list").await?;
        let mut state = self.state.lock().await;
        self.reload_locked(&mut state).await
    }

    pub async fn add_item(&self, draft: ItemDraft) -> EditorResult<Item> {
        require_identity(self.auth.as_ref(), "add an item").await?;
        let mut state = self.state.lock().await;
        state.gate.ensure_unlocked()?;

        let title = validate::item_title(&draft.title)?;
        let image_url = validate::image_url(draft.image_url.as_deref())?;
        let tier = match draft.tier {
            Some(tier) if state.registry.contains(&tier) => tier,
            Some(tier) => {
                return Err(EditorError::validation(format!("unknown tier '{tier}'")));
            }
            None => state
                .registry
                .first()
                .map(|tier| tier.name.clone())
                .ok_or_else(|| EditorError::validation("create a tier before adding items"))?,
        };
        let new_item = NewItem {
            title,
            image_url,
            position: state.board.count_in(&tier) as u32,
            tier,
        };

        let item = self
            .store
            .insert_item(self.list_id, &new_item)
            .await
            .map_err(|err| self.report(EditorError::store(&err)))?;
        info!(
            list_id = self.list_id.0,
            item_id = item.id.0,
            tier = %item.tier,
            "editor: added item"
        );
        state.board.insert(item.clone());
        self.emit(EditorEvent::ItemsChanged);
        Ok(item)
    }

    /// Changing the tier keeps the stored position, like a zone drop.
    pub async fn edit_item(&self, item_id: ItemId, edit: ItemEdit) -> EditorResult<Item> {
        require_identity(self.auth.as_ref(), "edit an item").await?;
        let mut state = self.state.lock().await;
        state.gate.ensure_unlocked()?;
        let mut item = state
            .board
            .get(item_id)
            .cloned()
            .ok_or_else(|| EditorError::NotFound(format!("item {item_id}")))?;

        let mut update = ItemUpdate::default();
        if let Some(title) = edit.title {
            update.title = Some(validate::item_title(&title)?);
        }
        if let Some(raw) = edit.image_url {
            update.image_url = Some(validate::image_url(Some(raw.as_str()))?);
        }
        if let Some(tier) = edit.tier {
            if !state.registry.contains(&tier) {
                return Err(EditorError::validation(format!("unknown tier '{tier}'")));
            }
            update.tier = Some(tier);
        }
        if update.is_empty() {
            return Ok(item);
        }

        self.store
            .update_item(item_id, &update)
            .await
            .map_err(|err| self.report(EditorError::store(&err)))?;

        if let Some(title) = update.title {
            item.title = title;
        }
        if let Some(image_url) = update.image_url {
            item.image_url = image_url;
        }
        if let Some(tier) = update.tier {
            item.tier = tier;
        }
        state.board.replace(item.clone());
        info!(
            list_id = self.list_id.0,
            item_id = item_id.0,
            tier = %item.tier,
            "editor: edited item"
        );
        self.emit(EditorEvent::ItemsChanged);
        Ok(item)
    }

    /// Deletes the item, then re-packs what is left in its tier.
    pub async fn delete_item(&self, item_id: ItemId) -> EditorResult<()> {
        require_identity(self.auth.as_ref(), "delete an item").await?;
        let mut state = self.state.lock().await;
        state.gate.ensure_unlocked()?;
        let tier = state
            .board
            .tier_of(item_id)
            .map(str::to_string)
            .ok_or_else(|| EditorError::NotFound(format!("item {item_id}")))?;

        self.store
            .delete_item(item_id)
            .await
            .map_err(|err| self.report(EditorError::store(&err)))?;
        state.board.remove(item_id);
        let repacked = state.board.normalize_tier(&tier);
        info!(
            list_id = self.list_id.0,
            item_id = item_id.0,
            tier = %tier,
            repacked = repacked.len(),
            "editor: deleted item"
        );
        self.emit(EditorEvent::ItemsChanged);

        if !repacked.is_empty() {
            if let Err(err) = self.store.upsert_items(&repacked).await {
                return Err(self.recover(&mut state, err, "re-pack after delete").await);
            }
        }
        Ok(())
    }

    pub async fn pick_up(&self, item_id: ItemId) -> EditorResult<DragSession> {
        let mut state = self.state.lock().await;
        let item = state
            .board
            .get(item_id)
            .cloned()
            .ok_or_else(|| EditorError::NotFound(format!("item {item_id}")))?;
        let gate = state.gate;
        let session = state.drag.pick_up(&gate, &item, Instant::now())?;
        debug!(
            list_id = self.list_id.0,
            item_id = item_id.0,
            tier = %session.tier,
            "editor: drag started"
        );
        Ok(session)
    }

    /// Returns whether the highlighted tier changed.
    pub async fn hover(&self, target: Option<DropTarget>) -> bool {
        let mut state = self.state.lock().await;
        let EditorState { drag, board, .. } = &mut *state;
        drag.hover(target.as_ref(), board)
    }

    pub async fn cancel_drag(&self) {
        self.state.lock().await.drag.cancel();
    }

    /// Completes the current drag on `target`.
    pub async fn drop_on(&self, target: Option<DropTarget>) -> EditorResult<CommitOutcome> {
        if let Err(err) = require_identity(self.auth.as_ref(), "move items").await {
            self.cancel_drag().await;
            return Err(err);
        }
        let mut state = self.state.lock().await;
        let gate = state.gate;

        let (session, target) = match state.drag.begin_commit(&gate, target)? {
            CommitStart::Ready { session, target } => (session, target),
            CommitStart::Skipped(reason) => return Ok(CommitOutcome::Skipped(reason)),
        };

        let planned = {
            let EditorState {
                board, registry, ..
            } = &*state;
            reconcile::plan(&gate, board, registry, &session, &target)
        };
        let change = match planned {
            Ok(Plan::Change(change)) => change,
            Ok(Plan::NoOp(reason)) => {
                state.drag.finish();
                debug!(
                    list_id = self.list_id.0,
                    item_id = session.item_id.0,
                    ?reason,
                    "editor: drop ignored"
                );
                return Ok(CommitOutcome::Skipped(reason));
            }
            Err(err) => {
                state.drag.cancel();
                return Err(err);
            }
        };

        if !state.drag.admit(change.commit_key(), Instant::now()) {
            state.drag.finish();
            debug!(
                list_id = self.list_id.0,
                item_id = change.item_id().0,
                "editor: duplicate commit dropped"
            );
            return Ok(CommitOutcome::Skipped(NoOpReason::Duplicate));
        }

        let applied = reconcile::apply(&gate, &mut state.board, &change);
        state.drag.finish();
        let pending = applied?;
        self.emit(EditorEvent::ItemsChanged);

        if let Err(err) = pending.persist(self.store.as_ref()).await {
            state.drag.forget(&change.commit_key());
            return Err(self.recover(&mut state, err, "persist drop").await);
        }

        Ok(match change {
            PlannedChange::CrossTier {
                item_id,
                from_tier,
                to_tier,
                ..
            } => {
                info!(
                    list_id = self.list_id.0,
                    item_id = item_id.0,
                    from = %from_tier,
                    tier = %to_tier,
                    "editor: moved item across tiers"
                );
                CommitOutcome::Moved {
                    item_id,
                    from_tier,
                    to_tier,
                }
            }
            PlannedChange::Reorder { item_id, tier, .. } => {
                let written = match &pending {
                    reconcile::PendingWrite::ItemPositions(items) => items.len(),
                    reconcile::PendingWrite::ItemTier { .. } => 1,
                };
                info!(
                    list_id = self.list_id.0,
                    item_id = item_id.0,
                    tier = %tier,
                    written,
                    "editor: reordered item"
                );
                CommitOutcome::Reordered {
                    item_id,
                    tier,
                    written,
                }
            }
        })
    }

    pub async fn add_tier(&self, name: &str, color: Option<TierColor>) -> EditorResult<Tier> {
        require_identity(self.auth.as_ref(), "add a tier").await?;
        let mut state = self.state.lock().await;
        let new_tier = state.registry.validate_new(&state.gate, name, color)?;
        let tier = self
            .store
            .insert_tier(self.list_id, &new_tier)
            .await
            .map_err(|err| self.report(EditorError::store(&err)))?;
        info!(
            list_id = self.list_id.0,
            tier = %tier.name,
            position = tier.position,
            "editor: added tier"
        );
        state.registry.insert(tier.clone());
        self.emit(EditorEvent::TiersChanged);
        Ok(tier)
    }

    pub async fn delete_tier(&self, name: &str) -> EditorResult<()> {
        require_identity(self.auth.as_ref(), "delete a tier").await?;
        let mut state = self.state.lock().await;
        let item_count = state.board.count_in(name);
        state.registry.check_delete(&state.gate, name, item_count)?;

        self.store
            .delete_tier(self.list_id, name)
            .await
            .map_err(|err| self.report(EditorError::store(&err)))?;
        let renumbered = state.registry.remove(name);
        info!(
            list_id = self.list_id.0,
            tier = %name,
            "editor: deleted tier"
        );
        self.emit(EditorEvent::TiersChanged);

        if !renumbered.is_empty() {
            if let Err(err) = self.store.upsert_tiers(&renumbered).await {
                return Err(self.recover(&mut state, err, "renumber tiers").await);
            }
        }
        Ok(())
    }

    /// Moves the tier at `from` to `to`. Returns `false` when nothing moved.
    pub async fn move_tier(&self, from: usize, to: usize) -> EditorResult<bool> {
        require_identity(self.auth.as_ref(), "reorder tiers").await?;
        let mut state = self.state.lock().await;
        let gate = state.gate;
        let reordered = state.registry.reorder(&gate, from, to)?;
        self.persist_tier_order(&mut state, reordered).await
    }

    /// Drops tier `dragged` onto tier `target`.
    pub async fn drop_tier_on(&self, dragged: &str, target: &str) -> EditorResult<bool> {
        require_identity(self.auth.as_ref(), "reorder tiers").await?;
        let mut state = self.state.lock().await;
        let gate = state.gate;
        let reordered = state.registry.reorder_by_name(&gate, dragged, target)?;
        self.persist_tier_order(&mut state, reordered).await
    }

    pub async fn recolor_tier(&self, name: &str, color: TierColor) -> EditorResult<()> {
        require_identity(self.auth.as_ref(), "change tier colors").await?;
        let mut state = self.state.lock().await;
        let tier_id = state.registry.check_recolor(&state.gate, name, &color)?;
        self.store
            .update_tier_colors(tier_id, &color)
            .await
            .map_err(|err| self.report(EditorError::store(&err)))?;
        state.registry.set_color(name, &color);
        info!(
            list_id = self.list_id.0,
            tier = %name,
            from = %color.from,
            to = %color.to,
            "editor: recolored tier"
        );
        self.emit(EditorEvent::TiersChanged);
        Ok(())
    }

    pub async fn complete(&self) -> EditorResult<()> {
        self.set_completed(true).await
    }

    pub async fn reopen(&self) -> EditorResult<()> {
        self.set_completed(false).await
    }

    async fn set_completed(&self, is_completed: bool) -> EditorResult<()> {
        let action = if is_completed {
            "complete the tier list"
        } else {
            "reopen the tier list"
        };
        require_identity(self.auth.as_ref(), action).await?;
        let mut state = self.state.lock().await;
        self.store
            .update_list_completed(self.list_id, is_completed)
            .await
            .map_err(|err| self.report(EditorError::store(&err)))?;
        state.gate.set_completed(is_completed);
        state.list.is_completed = is_completed;
        state.list.updated_at = Utc::now();
        state.drag.cancel();
        info!(list_id = self.list_id.0, is_completed, "editor: lock changed");
        self.emit(EditorEvent::LockChanged { is_completed });
        Ok(())
    }

    async fn persist_tier_order(
        &self,
        state: &mut EditorState,
        reordered: Option<Vec<Tier>>,
    ) -> EditorResult<bool> {
        let Some(tiers) = reordered else {
            return Ok(false);
        };
        self.emit(EditorEvent::TiersChanged);
        if let Err(err) = self.store.upsert_tiers(&tiers).await {
            return Err(self.recover(state, err, "persist tier order").await);
        }
        info!(
            list_id = self.list_id.0,
            order = ?tiers.iter().map(|tier| tier.name.as_str()).collect::<Vec<_>>(),
            "editor: reordered tiers"
        );
        Ok(true)
    }

    async fn reload_locked(&self, state: &mut EditorState) -> EditorResult<()> {
        let list = self
            .store
            .select_list(self.list_id)
            .await
            .map_err(|err| EditorError::store(&err))?
            .ok_or_else(|| EditorError::NotFound(format!("tier list {}", self.list_id)))?;
        let (tiers, items) = fetch_contents(self.store.as_ref(), self.list_id).await?;

        state.gate = LockGate::new(list.is_completed);
        state.list = list;
        state.registry = TierRegistry::from_tiers(tiers);
        state.board = ItemBoard::from_items(items);
        state.drag.cancel();
        self.renormalize(state).await;
        debug!(list_id = self.list_id.0, "editor: reloaded");
        self.emit(EditorEvent::Reloaded);
        Ok(())
    }

    /// Re-packs drifted positions locally. On an open list the drift is also
    /// written back; a failed write is only logged.
    async fn renormalize(&self, state: &mut EditorState) {
        let drifted_tiers = state.registry.normalize();
        let drifted_items = state.board.normalize_all();
        if state.gate.is_locked() {
            return;
        }
        if !drifted_tiers.is_empty() {
            if let Err(err) = self.store.upsert_tiers(&drifted_tiers).await {
                warn!(
                    list_id = self.list_id.0,
                    "editor: failed to persist re-normalized tier positions: {err:#}"
                );
            }
        }
        for (tier, items) in drifted_items {
            info!(
                list_id = self.list_id.0,
                tier = %tier,
                count = items.len(),
                "editor: re-normalizing drifted positions"
            );
            if let Err(err) = self.store.upsert_items(&items).await {
                warn!(
                    list_id = self.list_id.0,
                    tier = %tier,
                    "editor: failed to persist re-normalized positions: {err:#}"
                );
            }
        }
    }

    /// Turns a failed write into a `Store` error after resyncing with the store.
    async fn recover(
        &self,
        state: &mut EditorState,
        err: anyhow::Error,
        during: &str,
    ) -> EditorError {
        warn!(
            list_id = self.list_id.0,
            "editor: {during} failed, reloading: {err:#}"
        );
        if let Err(reload_err) = self.reload_locked(state).await {
            error!(
                list_id = self.list_id.0,
                "editor: reload after failed write also failed: {reload_err}"
            );
        }
        self.report(EditorError::store(&err))
    }

    fn report(&self, err: EditorError) -> EditorError {
        self.emit(EditorEvent::Error(err.to_string()));
        err
    }

    fn emit(&self, event: EditorEvent) {
        let _ = self.events.send(event);
    }
}

async fn fetch_contents(
    store: &dyn RecordStore,
    list_id: ListId,
) -> EditorResult<(Vec<Tier>, Vec<Item>)> {
    let tiers = store
        .select_tiers(list_id)
        .await
        .map_err(|err| EditorError::store(&err))?;
    let items = store
        .select_items(list_id)
        .await
        .map_err(|err| EditorError::store(&err))?;
    Ok((tiers, items))
}

#[cfg(test)]
#[path = "tests/editor_tests.rs"]
mod tests;
