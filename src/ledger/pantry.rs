/// Pantry items
use super::{require_owned, text_enum, Category, Owned, OwnedStore};
use crate::{
    activity::{ActivityLog, NewActivity},
    error::{PantryError, PantryResult},
    validation::require_text,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_ICON: &str = "📦";
pub const DEFAULT_LOW_STOCK_THRESHOLD: f64 = 10.0;

text_enum! {
    /// Unit a pantry quantity is measured in
    pub enum Unit ("unit") {
        Kg => "kg",
        G => "g",
        L => "l",
        Ml => "ml",
        Pcs => "pcs",
        Packets => "packets",
        Bottles => "bottles",
        Cans => "cans",
    }
}

/// Pantry item record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItem {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: Unit,
    pub category: Category,
    pub expiry_date: Option<DateTime<Utc>>,
    pub low_stock_threshold: f64,
    pub icon: String,
    pub added_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pantry item with derived stock flags, as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItemView {
    #[serde(flatten)]
    pub item: PantryItem,
    pub is_low_stock: bool,
    pub is_expired: bool,
}

impl PantryItem {
    const COLUMNS: &'static str = "id, owner_id, name, quantity, unit, category, expiry_date, \
         low_stock_threshold, icon, added_by, created_at, updated_at";

    fn from_row(row: &SqliteRow) -> PantryResult<Self> {
        let unit: String = row.try_get("unit")?;
        let category: String = row.try_get("category")?;

        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            unit: Unit::parse(&unit)?,
            category: Category::parse(&category)?,
            expiry_date: row.try_get("expiry_date")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
            icon: row.try_get("icon")?,
            added_by: row.try_get("added_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.map(|d| d < now).unwrap_or(false)
    }

    pub fn view(self) -> PantryItemView {
        let is_low_stock = self.is_low_stock();
        let is_expired = self.is_expired_at(Utc::now());
        PantryItemView {
            item: self,
            is_low_stock,
            is_expired,
        }
    }

    /// Write a new row using an existing connection
    pub(crate) async fn insert(&self, conn: &mut SqliteConnection) -> PantryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pantry_item (id, owner_id, name, quantity, unit, category, expiry_date,
                                     low_stock_threshold, icon, added_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&self.id)
        .bind(&self.owner_id)
        .bind(&self.name)
        .bind(self.quantity)
        .bind(self.unit.as_str())
        .bind(self.category.as_str())
        .bind(self.expiry_date)
        .bind(self.low_stock_threshold)
        .bind(&self.icon)
        .bind(&self.added_by)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}

impl Owned for PantryItem {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// New pantry item request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewPantryItem {
    pub name: String,
    #[validate(range(min = 0.0, message = "Quantity must be a non-negative number"))]
    pub quantity: f64,
    pub unit: Unit,
    pub category: Category,
    pub expiry_date: Option<DateTime<Utc>>,
    #[validate(range(min = 0.0, message = "Low stock threshold must be non-negative"))]
    pub low_stock_threshold: Option<f64>,
    pub icon: Option<String>,
    pub added_by: Option<String>,
}

/// Partial pantry item update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PantryItemPatch {
    pub name: Option<String>,
    #[validate(range(min = 0.0, message = "Quantity must be a non-negative number"))]
    pub quantity: Option<f64>,
    pub unit: Option<Unit>,
    pub category: Option<Category>,
    pub expiry_date: Option<DateTime<Utc>>,
    #[validate(range(min = 0.0, message = "Low stock threshold must be non-negative"))]
    pub low_stock_threshold: Option<f64>,
    pub icon: Option<String>,
}

/// Pantry store
#[derive(Clone)]
pub struct PantryStore {
    db: SqlitePool,
    activity: ActivityLog,
}

impl PantryStore {
    pub fn new(db: SqlitePool, activity: ActivityLog) -> Self {
        Self { db, activity }
    }

    /// All of an owner's items, by category then name
    pub async fn list(&self, owner_id: &str) -> PantryResult<Vec<PantryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pantry_item WHERE owner_id = ?1 ORDER BY category, name",
            PantryItem::COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(PantryItem::from_row).collect()
    }

    /// Items at or below their low-stock threshold
    pub async fn low_stock(&self, owner_id: &str, limit: i64) -> PantryResult<Vec<PantryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pantry_item WHERE owner_id = ?1 AND quantity <= low_stock_threshold \
             ORDER BY quantity, name LIMIT ?2",
            PantryItem::COLUMNS
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(PantryItem::from_row).collect()
    }

    pub async fn count(&self, owner_id: &str) -> PantryResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM pantry_item WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn create(&self, owner_id: &str, request: NewPantryItem) -> PantryResult<PantryItem> {
        request.validate()?;
        let name = require_text(&request.name, "Name is required")?;
        let now = Utc::now();

        let item = PantryItem {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name,
            quantity: request.quantity,
            unit: request.unit,
            category: request.category,
            expiry_date: request.expiry_date,
            low_stock_threshold: request
                .low_stock_threshold
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
            icon: request.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            added_by: request.added_by.unwrap_or_else(|| "You".to_string()),
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.db.acquire().await?;
        item.insert(&mut conn).await?;
        drop(conn);

        tracing::debug!(item_id = %item.id, owner_id, "Pantry item added");
        self.activity
            .record(
                owner_id,
                NewActivity::by_owner(format!("Added {} to pantry", item.name), "📥")
                    .with_metadata(serde_json::json!({ "itemId": item.id })),
            )
            .await;

        Ok(item)
    }

    pub async fn get(&self, owner_id: &str, id: &str) -> PantryResult<PantryItem> {
        require_owned(self, id, owner_id).await
    }

    /// Apply a partial update to an owned item
    pub async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: PantryItemPatch,
    ) -> PantryResult<PantryItem> {
        let mut item = require_owned(self, id, owner_id).await?;
        patch.validate()?;

        if let Some(name) = patch.name {
            item.name = require_text(&name, "Name is required")?;
        }
        if let Some(quantity) = patch.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = patch.unit {
            item.unit = unit;
        }
        if let Some(category) = patch.category {
            item.category = category;
        }
        if let Some(expiry_date) = patch.expiry_date {
            item.expiry_date = Some(expiry_date);
        }
        if let Some(threshold) = patch.low_stock_threshold {
            item.low_stock_threshold = threshold;
        }
        if let Some(icon) = patch.icon {
            item.icon = icon;
        }
        item.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE pantry_item
            SET name = ?1, quantity = ?2, unit = ?3, category = ?4, expiry_date = ?5,
                low_stock_threshold = ?6, icon = ?7, updated_at = ?8
            WHERE id = ?9 AND owner_id = ?10
            "#,
        )
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit.as_str())
        .bind(item.category.as_str())
        .bind(item.expiry_date)
        .bind(item.low_stock_threshold)
        .bind(&item.icon)
        .bind(item.updated_at)
        .bind(&item.id)
        .bind(owner_id)
        .execute(&self.db)
        .await?;

        Ok(item)
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> PantryResult<()> {
        let item = require_owned(self, id, owner_id).await?;

        sqlx::query("DELETE FROM pantry_item WHERE id = ?1 AND owner_id = ?2")
            .bind(&item.id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;

        self.activity
            .record(
                owner_id,
                NewActivity::by_owner(format!("Removed {} from pantry", item.name), "🗑️")
                    .with_metadata(serde_json::json!({ "itemId": item.id })),
            )
            .await;

        Ok(())
    }
}

#[async_trait]
impl OwnedStore for PantryStore {
    type Resource = PantryItem;
    const LABEL: &'static str = "Item";

    async fn find_by_id(&self, id: &str) -> PantryResult<Option<PantryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pantry_item WHERE id = ?1",
            PantryItem::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(PantryItem::from_row).transpose()
    }
}

impl From<&str> for Unit {
    /// Free-text units from grocery items; anything unrecognized counts as pieces
    fn from(value: &str) -> Self {
        Unit::parse(value).unwrap_or(Unit::Pcs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Duration;

    async fn create_account(db: &SqlitePool, id: &str) {
        sqlx::query(
            "INSERT INTO account (id, name, email, password_hash, is_verified, created_at) VALUES (?1, ?1, ?2, 'x', 1, ?3)",
        )
        .bind(id)
        .bind(format!("{}@x.com", id))
        .bind(Utc::now())
        .execute(db)
        .await
        .unwrap();
    }

    async fn store() -> PantryStore {
        let db = db::create_memory_pool().await.unwrap();
        create_account(&db, "alice").await;
        create_account(&db, "bob").await;
        PantryStore::new(db.clone(), ActivityLog::new(db))
    }

    fn rice() -> NewPantryItem {
        NewPantryItem {
            name: " Rice ".to_string(),
            quantity: 5.0,
            unit: Unit::Kg,
            category: Category::Grains,
            expiry_date: None,
            low_stock_threshold: None,
            icon: None,
            added_by: None,
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let store = store().await;
        let item = store.create("alice", rice()).await.unwrap();

        assert_eq!(item.name, "Rice");
        assert_eq!(item.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(item.icon, DEFAULT_ICON);
        assert_eq!(item.added_by, "You");
        assert!(item.is_low_stock());

        let activity = store.activity.recent("alice", 1).await.unwrap();
        assert_eq!(activity[0].action, "Added Rice to pantry");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let store = store().await;

        let mut negative = rice();
        negative.quantity = -1.0;
        assert!(matches!(
            store.create("alice", negative).await,
            Err(PantryError::Validation(_))
        ));

        let mut blank = rice();
        blank.name = "  ".to_string();
        assert!(matches!(
            store.create("alice", blank).await,
            Err(PantryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped_and_sorted() {
        let store = store().await;
        store.create("alice", rice()).await.unwrap();
        let mut milk = rice();
        milk.name = "Milk".to_string();
        milk.category = Category::Dairy;
        store.create("alice", milk).await.unwrap();
        store.create("bob", rice()).await.unwrap();

        let items = store.list("alice").await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Milk", "Rice"]);
        assert_eq!(store.count("bob").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cross_account_update_leaves_item_unchanged() {
        let store = store().await;
        let item = store.create("bob", rice()).await.unwrap();

        let patch = PantryItemPatch {
            quantity: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            store.update("alice", &item.id, patch).await,
            Err(PantryError::Forbidden(_))
        ));
        assert!(matches!(
            store.delete("alice", &item.id).await,
            Err(PantryError::Forbidden(_))
        ));
        assert!(matches!(
            store.get("alice", &item.id).await,
            Err(PantryError::Forbidden(_))
        ));

        let unchanged = store.get("bob", &item.id).await.unwrap();
        assert_eq!(unchanged.quantity, 5.0);
        assert_eq!(unchanged.updated_at, item.updated_at);
    }

    #[tokio::test]
    async fn test_owner_update_and_delete() {
        let store = store().await;
        let item = store.create("alice", rice()).await.unwrap();

        let updated = store
            .update(
                "alice",
                &item.id,
                PantryItemPatch {
                    quantity: Some(20.0),
                    unit: Some(Unit::G),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.quantity, 20.0);
        assert_eq!(updated.unit, Unit::G);
        assert!(updated.updated_at >= item.updated_at);
        assert!(!updated.is_low_stock());

        store.delete("alice", &item.id).await.unwrap();
        assert!(matches!(
            store.get("alice", &item.id).await,
            Err(PantryError::NotFound(_))
        ));
    }

    #[test]
    fn test_derived_flags() {
        let now = Utc::now();
        let item = PantryItem {
            id: "i".to_string(),
            owner_id: "o".to_string(),
            name: "Milk".to_string(),
            quantity: 2.0,
            unit: Unit::L,
            category: Category::Dairy,
            expiry_date: Some(now - Duration::days(1)),
            low_stock_threshold: 1.0,
            icon: DEFAULT_ICON.to_string(),
            added_by: "You".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(!item.is_low_stock());
        assert!(item.is_expired_at(now));

        let json = serde_json::to_value(item.view()).unwrap();
        assert_eq!(json["isExpired"], true);
        assert_eq!(json["isLowStock"], false);
        assert_eq!(json["unit"], "l");
        assert!(json.get("ownerId").is_none());
    }

    #[test]
    fn test_free_text_unit_falls_back_to_pieces() {
        assert_eq!(Unit::from("KG"), Unit::Kg);
        assert_eq!(Unit::from("bunch"), Unit::Pcs);
    }
}
