use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use shared::{
    domain::{Identity, Item, ItemId, ListId, Tier, TierColor, TierId, TierList, UserId},
    protocol::{AuthSession, ItemUpdate, NewItem, NewTier},
};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{auth::AuthProvider, store::RecordStore};

pub(crate) const OWNER: UserId = UserId(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteCall {
    InsertList(String),
    UpdateListCompleted(ListId, bool),
    InsertTier(String),
    UpdateTierColors(TierId),
    UpsertTiers(Vec<TierId>),
    DeleteTier(String),
    InsertItem(String),
    UpdateItem(ItemId),
    UpsertItems(Vec<ItemId>),
    DeleteItem(ItemId),
}

#[derive(Default)]
struct Records {
    next_id: i64,
    lists: Vec<TierList>,
    tiers: Vec<Tier>,
    items: Vec<Item>,
}

impl Records {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory record store. Reads always succeed; writes fail while
/// `fail_with` is set.
#[derive(Default)]
pub(crate) struct TestRecordStore {
    records: Mutex<Records>,
    fail_with: Mutex<Option<String>>,
    writes: Mutex<Vec<WriteCall>>,
}

impl TestRecordStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_writes_with(&self, err: impl Into<String>) {
        *self.fail_with.lock().expect("fail_with") = Some(err.into());
    }

    pub(crate) fn heal(&self) {
        *self.fail_with.lock().expect("fail_with") = None;
    }

    pub(crate) fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().expect("writes").clone()
    }

    pub(crate) fn clear_writes(&self) {
        self.writes.lock().expect("writes").clear();
    }

    pub(crate) fn seed_list(&self, owner: UserId, title: &str, is_completed: bool) -> TierList {
        let mut records = self.records.lock().expect("records");
        let id = ListId(records.next_id());
        let created_at = Utc::now() + ChronoDuration::milliseconds(id.0);
        let list = TierList {
            id,
            owner_id: owner,
            title: title.to_string(),
            is_completed,
            created_at,
            updated_at: created_at,
        };
        records.lists.push(list.clone());
        list
    }

    pub(crate) fn seed_tier(&self, list_id: ListId, name: &str, position: u32) -> Tier {
        let mut records = self.records.lock().expect("records");
        let color = TierColor::default();
        let tier = Tier {
            id: TierId(records.next_id()),
            list_id,
            name: name.to_string(),
            position,
            color_from: color.from,
            color_to: color.to,
        };
        records.tiers.push(tier.clone());
        tier
    }

    pub(crate) fn seed_item(&self, list_id: ListId, title: &str, tier: &str, position: u32) -> Item {
        let mut records = self.records.lock().expect("records");
        let item = Item {
            id: ItemId(records.next_id()),
            list_id,
            title: title.to_string(),
            image_url: None,
            position,
            tier: tier.to_string(),
        };
        records.items.push(item.clone());
        item
    }

    pub(crate) fn stored_items(&self, list_id: ListId) -> Vec<Item> {
        let records = self.records.lock().expect("records");
        let mut items: Vec<Item> = records
            .items
            .iter()
            .filter(|item| item.list_id == list_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.tier.clone(), item.position, item.id));
        items
    }

    pub(crate) fn stored_item(&self, item_id: ItemId) -> Option<Item> {
        let records = self.records.lock().expect("records");
        records.items.iter().find(|item| item.id == item_id).cloned()
    }

    pub(crate) fn stored_tiers(&self, list_id: ListId) -> Vec<Tier> {
        let records = self.records.lock().expect("records");
        let mut tiers: Vec<Tier> = records
            .tiers
            .iter()
            .filter(|tier| tier.list_id == list_id)
            .cloned()
            .collect();
        tiers.sort_by_key(|tier| (tier.position, tier.id));
        tiers
    }

    fn write(&self, call: WriteCall) -> Result<()> {
        if let Some(err) = self.fail_with.lock().expect("fail_with").clone() {
            bail!(err);
        }
        self.writes.lock().expect("writes").push(call);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for TestRecordStore {
    async fn select_list(&self, list_id: ListId) -> Result<Option<TierList>> {
        let records = self.records.lock().expect("records");
        Ok(records.lists.iter().find(|list| list.id == list_id).cloned())
    }

    async fn select_lists_for_owner(&self, owner: UserId) -> Result<Vec<TierList>> {
        let records = self.records.lock().expect("records");
        Ok(records
            .lists
            .iter()
            .filter(|list| list.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn insert_list(&self, owner: UserId, title: &str) -> Result<TierList> {
        self.write(WriteCall::InsertList(title.to_string()))?;
        Ok(self.seed_list(owner, title, false))
    }

    async fn update_list_completed(&self, list_id: ListId, is_completed: bool) -> Result<()> {
        self.write(WriteCall::UpdateListCompleted(list_id, is_completed))?;
        let mut records = self.records.lock().expect("records");
        let list = records
            .lists
            .iter_mut()
            .find(|list| list.id == list_id)
            .ok_or_else(|| anyhow!("tier list {list_id} not found"))?;
        list.is_completed = is_completed;
        list.updated_at = Utc::now();
        Ok(())
    }

    async fn select_tiers(&self, list_id: ListId) -> Result<Vec<Tier>> {
        Ok(self.stored_tiers(list_id))
    }

    async fn insert_tier(&self, list_id: ListId, tier: &NewTier) -> Result<Tier> {
        self.write(WriteCall::InsertTier(tier.name.clone()))?;
        let mut stored = self.seed_tier(list_id, &tier.name, tier.position);
        stored.color_from = tier.color.from.clone();
        stored.color_to = tier.color.to.clone();
        let mut records = self.records.lock().expect("records");
        if let Some(slot) = records.tiers.iter_mut().find(|slot| slot.id == stored.id) {
            *slot = stored.clone();
        }
        Ok(stored)
    }

    async fn update_tier_colors(&self, tier_id: TierId, color: &TierColor) -> Result<()> {
        self.write(WriteCall::UpdateTierColors(tier_id))?;
        let mut records = self.records.lock().expect("records");
        let tier = records
            .tiers
            .iter_mut()
            .find(|tier| tier.id == tier_id)
            .ok_or_else(|| anyhow!("tier {tier_id} not found"))?;
        tier.color_from = color.from.clone();
        tier.color_to = color.to.clone();
        Ok(())
    }

    async fn upsert_tiers(&self, tiers: &[Tier]) -> Result<()> {
        self.write(WriteCall::UpsertTiers(
            tiers.iter().map(|tier| tier.id).collect(),
        ))?;
        let mut records = self.records.lock().expect("records");
        for tier in tiers {
            match records.tiers.iter_mut().find(|slot| slot.id == tier.id) {
                Some(slot) => *slot = tier.clone(),
                None => records.tiers.push(tier.clone()),
            }
        }
        Ok(())
    }

    async fn delete_tier(&self, list_id: ListId, name: &str) -> Result<()> {
        self.write(WriteCall::DeleteTier(name.to_string()))?;
        let mut records = self.records.lock().expect("records");
        records
            .tiers
            .retain(|tier| !(tier.list_id == list_id && tier.name == name));
        Ok(())
    }

    async fn select_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        Ok(self.stored_items(list_id))
    }

    async fn insert_item(&self, list_id: ListId, item: &NewItem) -> Result<Item> {
        self.write(WriteCall::InsertItem(item.title.clone()))?;
        let mut stored = self.seed_item(list_id, &item.title, &item.tier, item.position);
        stored.image_url = item.image_url.clone();
        let mut records = self.records.lock().expect("records");
        if let Some(slot) = records.items.iter_mut().find(|slot| slot.id == stored.id) {
            *slot = stored.clone();
        }
        Ok(stored)
    }

    async fn update_item(&self, item_id: ItemId, update: &ItemUpdate) -> Result<()> {
        self.write(WriteCall::UpdateItem(item_id))?;
        let mut records = self.records.lock().expect("records");
        let item = records
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| anyhow!("item {item_id} not found"))?;
        if let Some(title) = &update.title {
            item.title = title.clone();
        }
        if let Some(image_url) = &update.image_url {
            item.image_url = image_url.clone();
        }
        if let Some(tier) = &update.tier {
            item.tier = tier.clone();
        }
        if let Some(position) = update.position {
            item.position = position;
        }
        Ok(())
    }

    async fn upsert_items(&self, items: &[Item]) -> Result<()> {
        self.write(WriteCall::UpsertItems(
            items.iter().map(|item| item.id).collect(),
        ))?;
        let mut records = self.records.lock().expect("records");
        for item in items {
            match records.items.iter_mut().find(|slot| slot.id == item.id) {
                Some(slot) => *slot = item.clone(),
                None => records.items.push(item.clone()),
            }
        }
        Ok(())
    }

    async fn delete_item(&self, item_id: ItemId) -> Result<()> {
        self.write(WriteCall::DeleteItem(item_id))?;
        let mut records = self.records.lock().expect("records");
        records.items.retain(|item| item.id != item_id);
        Ok(())
    }
}

/// Auth double whose identity is set directly by the test.
pub(crate) struct TestAuth {
    identity: watch::Sender<Option<Identity>>,
    fail_with: Option<String>,
}

impl TestAuth {
    pub(crate) fn signed_in(user_id: UserId) -> Arc<Self> {
        let (identity, _) = watch::channel(Some(Identity {
            user_id,
            email: format!("user{}@example.com", user_id.0),
        }));
        Arc::new(Self {
            identity,
            fail_with: None,
        })
    }

    pub(crate) fn signed_out() -> Arc<Self> {
        let (identity, _) = watch::channel(None);
        Arc::new(Self {
            identity,
            fail_with: None,
        })
    }

    pub(crate) fn failing(err: impl Into<String>) -> Arc<Self> {
        let (identity, _) = watch::channel(None);
        Arc::new(Self {
            identity,
            fail_with: Some(err.into()),
        })
    }

    pub(crate) fn set_identity(&self, identity: Option<Identity>) {
        self.identity.send_replace(identity);
    }
}

#[async_trait]
impl AuthProvider for TestAuth {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        Ok(self.get_user().await?.map(|identity| AuthSession {
            identity,
            token: Uuid::new_v4(),
            issued_at: Utc::now(),
        }))
    }

    async fn get_user(&self) -> Result<Option<Identity>> {
        if let Some(err) = &self.fail_with {
            bail!(err.clone());
        }
        Ok(self.identity.borrow().clone())
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<AuthSession> {
        bail!("not supported by test auth")
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<AuthSession> {
        bail!("not supported by test auth")
    }

    async fn sign_out(&self) -> Result<()> {
        self.identity.send_replace(None);
        Ok(())
    }

    fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}

pub(crate) fn item(id: i64, title: &str, tier: &str, position: u32) -> Item {
    Item {
        id: ItemId(id),
        list_id: ListId(1),
        title: title.to_string(),
        image_url: None,
        position,
        tier: tier.to_string(),
    }
}

pub(crate) fn tier(id: i64, name: &str, position: u32) -> Tier {
    let color = TierColor::default();
    Tier {
        id: TierId(id),
        list_id: ListId(1),
        name: name.to_string(),
        position,
        color_from: color.from,
        color_to: color.to,
    }
}

pub(crate) fn titles(items: &[Item]) -> Vec<&str> {
    items.iter().map(|item| item.title.as_str()).collect()
}
