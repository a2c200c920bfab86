use anyhow::{bail, Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{Item, ItemId, ListId, Tier, TierColor, TierId, TierList, UserId},
    protocol::{ItemUpdate, NewItem, NewTier},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user_id: UserId,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every connection to `:memory:` opens a fresh database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (email, password_hash, password_salt, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(email)
        .bind(password_hash)
        .bind(password_salt)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create user '{email}'"))?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn user_credentials(&self, email: &str) -> Result<Option<StoredCredentials>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, password_salt FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredCredentials {
            user_id: UserId(r.get::<i64, _>("id")),
            email: r.get::<String, _>("email"),
            password_hash: r.get::<String, _>("password_hash"),
            password_salt: r.get::<String, _>("password_salt"),
        }))
    }

    pub async fn email_for_user(&self, user_id: UserId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT email FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn create_list(&self, owner_user_id: UserId, title: &str) -> Result<TierList> {
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO tier_lists (owner_user_id, title, is_completed, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?)
             RETURNING id, owner_user_id, title, is_completed, created_at, updated_at",
        )
        .bind(owner_user_id.0)
        .bind(title)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert tier list")?;
        Ok(list_from_row(&row))
    }

    pub async fn get_list(&self, list_id: ListId) -> Result<Option<TierList>> {
        let row = sqlx::query(
            "SELECT id, owner_user_id, title, is_completed, created_at, updated_at
             FROM tier_lists WHERE id = ?",
        )
        .bind(list_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(list_from_row))
    }

    pub async fn list_lists_for_owner(&self, owner_user_id: UserId) -> Result<Vec<TierList>> {
        let rows = sqlx::query(
            "SELECT id, owner_user_id, title, is_completed, created_at, updated_at
             FROM tier_lists
             WHERE owner_user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_user_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(list_from_row).collect())
    }

    pub async fn set_list_completed(&self, list_id: ListId, is_completed: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tier_lists SET is_completed = ?, updated_at = ? WHERE id = ?",
        )
        .bind(is_completed)
        .bind(Utc::now())
        .bind(list_id.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            bail!("tier list {list_id} not found");
        }
        Ok(())
    }

    pub async fn list_tiers(&self, list_id: ListId) -> Result<Vec<Tier>> {
        let rows = sqlx::query(
            "SELECT id, tier_list_id, name, position, color_from, color_to
             FROM tiers
             WHERE tier_list_id = ?
             ORDER BY position ASC, id ASC",
        )
        .bind(list_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(tier_from_row).collect())
    }

    pub async fn insert_tier(&self, list_id: ListId, tier: &NewTier) -> Result<Tier> {
        let row = sqlx::query(
            "INSERT INTO tiers (tier_list_id, name, position, color_from, color_to)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, tier_list_id, name, position, color_from, color_to",
        )
        .bind(list_id.0)
        .bind(&tier.name)
        .bind(tier.position)
        .bind(&tier.color.from)
        .bind(&tier.color.to)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert tier '{}'", tier.name))?;
        Ok(tier_from_row(&row))
    }

    pub async fn update_tier_colors(&self, tier_id: TierId, color: &TierColor) -> Result<()> {
        let result = sqlx::query("UPDATE tiers SET color_from = ?, color_to = ? WHERE id = ?")
            .bind(&color.from)
            .bind(&color.to)
            .bind(tier_id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("tier {tier_id} not found");
        }
        Ok(())
    }

    /// Writes each tier row in turn. Not wrapped in a transaction.
    pub async fn upsert_tiers(&self, tiers: &[Tier]) -> Result<()> {
        for tier in tiers {
            sqlx::query(
                "INSERT INTO tiers (id, tier_list_id, name, position, color_from, color_to)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    position = excluded.position,
                    color_from = excluded.color_from,
                    color_to = excluded.color_to",
            )
            .bind(tier.id.0)
            .bind(tier.list_id.0)
            .bind(&tier.name)
            .bind(tier.position)
            .bind(&tier.color_from)
            .bind(&tier.color_to)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to upsert tier {}", tier.id))?;
        }
        Ok(())
    }

    pub async fn delete_tier(&self, list_id: ListId, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM tiers WHERE tier_list_id = ? AND name = ?")
            .bind(list_id.0)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT id, tier_list_id, title, image_url, position, tier
             FROM tier_list_items
             WHERE tier_list_id = ?
             ORDER BY position ASC, id ASC",
        )
        .bind(list_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    pub async fn insert_item(&self, list_id: ListId, item: &NewItem) -> Result<Item> {
        let row = sqlx::query(
            "INSERT INTO tier_list_items (tier_list_id, title, image_url, position, tier)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, tier_list_id, title, image_url, position, tier",
        )
        .bind(list_id.0)
        .bind(&item.title)
        .bind(item.image_url.as_deref())
        .bind(item.position)
        .bind(&item.tier)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert item")?;
        Ok(item_from_row(&row))
    }

    pub async fn update_item(&self, item_id: ItemId, update: &ItemUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let result = sqlx::query(
            "UPDATE tier_list_items SET
                title = COALESCE(?, title),
                tier = COALESCE(?, tier),
                position = COALESCE(?, position),
                image_url = CASE WHEN ? THEN ? ELSE image_url END
             WHERE id = ?",
        )
        .bind(update.title.as_deref())
        .bind(update.tier.as_deref())
        .bind(update.position)
        .bind(update.image_url.is_some())
        .bind(update.image_url.clone().flatten())
        .bind(item_id.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            bail!("item {item_id} not found");
        }
        Ok(())
    }

    /// Writes each item row in turn. Not wrapped in a transaction.
    pub async fn upsert_items(&self, items: &[Item]) -> Result<()> {
        for item in items {
            sqlx::query(
                "INSERT INTO tier_list_items (id, tier_list_id, title, image_url, position, tier)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    image_url = excluded.image_url,
                    position = excluded.position,
                    tier = excluded.tier",
            )
            .bind(item.id.0)
            .bind(item.list_id.0)
            .bind(&item.title)
            .bind(item.image_url.as_deref())
            .bind(item.position)
            .bind(&item.tier)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to upsert item {}", item.id))?;
        }
        Ok(())
    }

    pub async fn delete_item(&self, item_id: ItemId) -> Result<()> {
        sqlx::query("DELETE FROM tier_list_items WHERE id = ?")
            .bind(item_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn list_from_row(r: &SqliteRow) -> TierList {
    TierList {
        id: ListId(r.get::<i64, _>("id")),
        owner_id: UserId(r.get::<i64, _>("owner_user_id")),
        title: r.get::<String, _>("title"),
        is_completed: r.get::<bool, _>("is_completed"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn tier_from_row(r: &SqliteRow) -> Tier {
    Tier {
        id: TierId(r.get::<i64, _>("id")),
        list_id: ListId(r.get::<i64, _>("tier_list_id")),
        name: r.get::<String, _>("name"),
        position: r.get::<u32, _>("position"),
        color_from: r.get::<String, _>("color_from"),
        color_to: r.get::<String, _>("color_to"),
    }
}

fn item_from_row(r: &SqliteRow) -> Item {
    Item {
        id: ItemId(r.get::<i64, _>("id")),
        list_id: ListId(r.get::<i64, _>("tier_list_id")),
        title: r.get::<String, _>("title"),
        image_url: r.get::<Option<String>, _>("image_url"),
        position: r.get::<u32, _>("position"),
        tier: r.get::<String, _>("tier"),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
