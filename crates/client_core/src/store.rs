use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{Item, ItemId, ListId, Tier, TierColor, TierId, TierList, UserId},
    protocol::{ItemUpdate, NewItem, NewTier},
};
use storage::Storage;

/// Row-level access to lists, tiers and items. Every call may fail; callers
/// decide whether a failure is worth a reload.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select_list(&self, list_id: ListId) -> Result<Option<TierList>>;
    async fn select_lists_for_owner(&self, owner: UserId) -> Result<Vec<TierList>>;
    async fn insert_list(&self, owner: UserId, title: &str) -> Result<TierList>;
    async fn update_list_completed(&self, list_id: ListId, is_completed: bool) -> Result<()>;

    async fn select_tiers(&self, list_id: ListId) -> Result<Vec<Tier>>;
    async fn insert_tier(&self, list_id: ListId, tier: &NewTier) -> Result<Tier>;
    async fn update_tier_colors(&self, tier_id: TierId, color: &TierColor) -> Result<()>;
    async fn upsert_tiers(&self, tiers: &[Tier]) -> Result<()>;
    async fn delete_tier(&self, list_id: ListId, name: &str) -> Result<()>;

    async fn select_items(&self, list_id: ListId) -> Result<Vec<Item>>;
    async fn insert_item(&self, list_id: ListId, item: &NewItem) -> Result<Item>;
    async fn update_item(&self, item_id: ItemId, update: &ItemUpdate) -> Result<()>;
    async fn upsert_items(&self, items: &[Item]) -> Result<()>;
    async fn delete_item(&self, item_id: ItemId) -> Result<()>;
}

pub struct MissingRecordStore;

fn missing() -> anyhow::Error {
    anyhow!("record store is not configured")
}

#[async_trait]
impl RecordStore for MissingRecordStore {
    async fn select_list(&self, _list_id: ListId) -> Result<Option<TierList>> {
        Err(missing())
    }

    async fn select_lists_for_owner(&self, _owner: UserId) -> Result<Vec<TierList>> {
        Err(missing())
    }

    async fn insert_list(&self, _owner: UserId, _title: &str) -> Result<TierList> {
        Err(missing())
    }

    async fn update_list_completed(&self, _list_id: ListId, _is_completed: bool) -> Result<()> {
        Err(missing())
    }

    async fn select_tiers(&self, _list_id: ListId) -> Result<Vec<Tier>> {
        Err(missing())
    }

    async fn insert_tier(&self, _list_id: ListId, _tier: &NewTier) -> Result<Tier> {
        Err(missing())
    }

    async fn update_tier_colors(&self, _tier_id: TierId, _color: &TierColor) -> Result<()> {
        Err(missing())
    }

    async fn upsert_tiers(&self, _tiers: &[Tier]) -> Result<()> {
        Err(missing())
    }

    async fn delete_tier(&self, _list_id: ListId, _name: &str) -> Result<()> {
        Err(missing())
    }

    async fn select_items(&self, _list_id: ListId) -> Result<Vec<Item>> {
        Err(missing())
    }

    async fn insert_item(&self, _list_id: ListId, _item: &NewItem) -> Result<Item> {
        Err(missing())
    }

    async fn update_item(&self, _item_id: ItemId, _update: &ItemUpdate) -> Result<()> {
        Err(missing())
    }

    async fn upsert_items(&self, _items: &[Item]) -> Result<()> {
        Err(missing())
    }

    async fn delete_item(&self, _item_id: ItemId) -> Result<()> {
        Err(missing())
    }
}

#[async_trait]
impl RecordStore for Storage {
    async fn select_list(&self, list_id: ListId) -> Result<Option<TierList>> {
        self.get_list(list_id).await
    }

    async fn select_lists_for_owner(&self, owner: UserId) -> Result<Vec<TierList>> {
        self.list_lists_for_owner(owner).await
    }

    async fn insert_list(&self, owner: UserId, title: &str) -> Result<TierList> {
        self.create_list(owner, title).await
    }

    async fn update_list_completed(&self, list_id: ListId, is_completed: bool) -> Result<()> {
        self.set_list_completed(list_id, is_completed).await
    }

    async fn select_tiers(&self, list_id: ListId) -> Result<Vec<Tier>> {
        self.list_tiers(list_id).await
    }

    async fn insert_tier(&self, list_id: ListId, tier: &NewTier) -> Result<Tier> {
        Storage::insert_tier(self, list_id, tier).await
    }

    async fn update_tier_colors(&self, tier_id: TierId, color: &TierColor) -> Result<()> {
        Storage::update_tier_colors(self, tier_id, color).await
    }

    async fn upsert_tiers(&self, tiers: &[Tier]) -> Result<()> {
        Storage::upsert_tiers(self, tiers).await
    }

    async fn delete_tier(&self, list_id: ListId, name: &str) -> Result<()> {
        Storage::delete_tier(self, list_id, name).await
    }

    async fn select_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        self.list_items(list_id).await
    }

    async fn insert_item(&self, list_id: ListId, item: &NewItem) -> Result<Item> {
        Storage::insert_item(self, list_id, item).await
    }

    async fn update_item(&self, item_id: ItemId, update: &ItemUpdate) -> Result<()> {
        Storage::update_item(self, item_id, update).await
    }

    async fn upsert_items(&self, items: &[Item]) -> Result<()> {
        Storage::upsert_items(self, items).await
    }

    async fn delete_item(&self, item_id: ItemId) -> Result<()> {
        Storage::delete_item(self, item_id).await
    }
}
