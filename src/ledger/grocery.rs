/// Grocery list items and the move-to-pantry transfer
use super::{
    pantry::{self, Unit},
    require_owned, text_enum, Category, Owned, OwnedStore, PantryItem,
};
use crate::{
    activity::{ActivityLog, NewActivity},
    error::{PantryError, PantryResult},
    validation::require_text,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_ICON: &str = "🛒";
pub const DEFAULT_UNIT: &str = "pcs";

text_enum! {
    /// How urgently an item is needed
    pub enum Priority ("priority") {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Grocery item record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(rename = "isAISuggested")]
    pub is_ai_suggested: bool,
    pub ai_reason: Option<String>,
    pub used_in: Option<String>,
    pub checked: bool,
    pub icon: String,
    pub added_by: String,
    pub created_at: DateTime<Utc>,
}

impl GroceryItem {
    const COLUMNS: &'static str = "id, owner_id, name, quantity, unit, category, priority, \
         is_ai_suggested, ai_reason, used_in, checked, icon, added_by, created_at";

    fn from_row(row: &SqliteRow) -> PantryResult<Self> {
        let category: String = row.try_get("category")?;
        let priority: String = row.try_get("priority")?;

        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            unit: row.try_get("unit")?,
            category: Category::parse(&category)?,
            priority: Priority::parse(&priority)?,
            is_ai_suggested: row.try_get("is_ai_suggested")?,
            ai_reason: row.try_get("ai_reason")?,
            used_in: row.try_get("used_in")?,
            checked: row.try_get("checked")?,
            icon: row.try_get("icon")?,
            added_by: row.try_get("added_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Merge key for grocery names. SQLite's NOCASE only folds ASCII, so the
/// key is computed here and stored alongside the name.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Owned for GroceryItem {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// New grocery item request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGroceryItem {
    pub name: String,
    #[validate(range(min = 0.0, message = "Quantity must be a non-negative number"))]
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub category: Category,
    pub priority: Option<Priority>,
    #[serde(default, rename = "isAISuggested")]
    pub is_ai_suggested: bool,
    pub ai_reason: Option<String>,
    pub used_in: Option<String>,
    pub icon: Option<String>,
    pub added_by: Option<String>,
}

/// Partial grocery item update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItemPatch {
    pub name: Option<String>,
    #[validate(range(min = 0.0, message = "Quantity must be a non-negative number"))]
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub checked: Option<bool>,
    pub used_in: Option<String>,
    pub icon: Option<String>,
}

/// Outcome of adding to the grocery list
#[derive(Debug, Clone)]
pub enum GroceryAdd {
    Created(GroceryItem),
    /// An item with the same name existed and its quantity was bumped
    Merged(GroceryItem),
}

impl GroceryAdd {
    pub fn item(&self) -> &GroceryItem {
        match self {
            GroceryAdd::Created(item) | GroceryAdd::Merged(item) => item,
        }
    }

    pub fn into_item(self) -> GroceryItem {
        match self {
            GroceryAdd::Created(item) | GroceryAdd::Merged(item) => item,
        }
    }
}

/// Grocery store
#[derive(Clone)]
pub struct GroceryStore {
    db: SqlitePool,
    activity: ActivityLog,
}

impl GroceryStore {
    pub fn new(db: SqlitePool, activity: ActivityLog) -> Self {
        Self { db, activity }
    }

    /// All of an owner's items, unchecked first then newest
    pub async fn list(&self, owner_id: &str) -> PantryResult<Vec<GroceryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM grocery_item WHERE owner_id = ?1 ORDER BY checked ASC, created_at DESC",
            GroceryItem::COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(GroceryItem::from_row).collect()
    }

    pub async fn count(&self, owner_id: &str) -> PantryResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM grocery_item WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Add an item, or bump the quantity of a same-named one (case-insensitive)
    pub async fn add(&self, owner_id: &str, request: NewGroceryItem) -> PantryResult<GroceryAdd> {
        request.validate()?;
        let name = require_text(&request.name, "Name is required")?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM grocery_item WHERE owner_id = ?1 AND name_key = ?2 LIMIT 1",
            GroceryItem::COLUMNS
        ))
        .bind(owner_id)
        .bind(name_key(&name))
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = existing {
            let mut item = GroceryItem::from_row(&row)?;
            item.quantity += 1.0;

            sqlx::query("UPDATE grocery_item SET quantity = ?1 WHERE id = ?2")
                .bind(item.quantity)
                .bind(&item.id)
                .execute(&self.db)
                .await?;

            self.activity
                .record(
                    owner_id,
                    NewActivity::by_owner(format!("Increased quantity of {}", item.name), "➕")
                        .with_metadata(serde_json::json!({ "itemId": item.id })),
                )
                .await;

            return Ok(GroceryAdd::Merged(item));
        }

        let item = GroceryItem {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name,
            quantity: request.quantity.unwrap_or(1.0),
            unit: request
                .unit
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            category: request.category,
            priority: request.priority.unwrap_or_default(),
            is_ai_suggested: request.is_ai_suggested,
            ai_reason: request.ai_reason,
            used_in: request.used_in,
            checked: false,
            icon: request.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            added_by: request.added_by.unwrap_or_else(|| "You".to_string()),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO grocery_item (id, owner_id, name, name_key, quantity, unit, category, priority,
                                      is_ai_suggested, ai_reason, used_in, checked, icon, added_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&item.id)
        .bind(&item.owner_id)
        .bind(&item.name)
        .bind(name_key(&item.name))
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.category.as_str())
        .bind(item.priority.as_str())
        .bind(item.is_ai_suggested)
        .bind(&item.ai_reason)
        .bind(&item.used_in)
        .bind(item.checked)
        .bind(&item.icon)
        .bind(&item.added_by)
        .bind(item.created_at)
        .execute(&self.db)
        .await?;

        self.activity
            .record(
                owner_id,
                NewActivity::by_owner(format!("Added {} to grocery list", item.name), "🛒")
                    .with_metadata(serde_json::json!({ "itemId": item.id })),
            )
            .await;

        Ok(GroceryAdd::Created(item))
    }

    pub async fn get(&self, owner_id: &str, id: &str) -> PantryResult<GroceryItem> {
        require_owned(self, id, owner_id).await
    }

    /// Apply a partial update to an owned item
    pub async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: GroceryItemPatch,
    ) -> PantryResult<GroceryItem> {
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
        if let Some(priority) = patch.priority {
            item.priority = priority;
        }
        if let Some(checked) = patch.checked {
            item.checked = checked;
        }
        if let Some(used_in) = patch.used_in {
            item.used_in = Some(used_in);
        }
        if let Some(icon) = patch.icon {
            item.icon = icon;
        }

        sqlx::query(
            r#"
            UPDATE grocery_item
            SET name = ?1, name_key = ?2, quantity = ?3, unit = ?4, category = ?5, priority = ?6,
                checked = ?7, used_in = ?8, icon = ?9
            WHERE id = ?10 AND owner_id = ?11
            "#,
        )
        .bind(&item.name)
        .bind(name_key(&item.name))
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.category.as_str())
        .bind(item.priority.as_str())
        .bind(item.checked)
        .bind(&item.used_in)
        .bind(&item.icon)
        .bind(&item.id)
        .bind(owner_id)
        .execute(&self.db)
        .await?;

        Ok(item)
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> PantryResult<()> {
        let item = require_owned(self, id, owner_id).await?;

        sqlx::query("DELETE FROM grocery_item WHERE id = ?1 AND owner_id = ?2")
            .bind(&item.id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Convert the owner's listed items into pantry items and drop them from
    /// the list, atomically. Ids belonging to other accounts are ignored.
    pub async fn move_to_pantry(&self, owner_id: &str, item_ids: &[String]) -> PantryResult<usize> {
        let mut tx = self.db.begin().await?;

        let mut moving = Vec::new();
        for id in item_ids {
            let row = sqlx::query(&format!(
                "SELECT {} FROM grocery_item WHERE id = ?1 AND owner_id = ?2",
                GroceryItem::COLUMNS
            ))
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = row {
                let item = GroceryItem::from_row(&row)?;
                if !moving.iter().any(|m: &GroceryItem| m.id == item.id) {
                    moving.push(item);
                }
            }
        }

        if moving.is_empty() {
            return Err(PantryError::Validation(
                "No valid items found to move".to_string(),
            ));
        }

        let now = Utc::now();
        for grocery in &moving {
            let pantry_item = PantryItem {
                id: Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                name: grocery.name.clone(),
                quantity: grocery.quantity,
                unit: Unit::from(grocery.unit.as_str()),
                category: grocery.category,
                expiry_date: None,
                low_stock_threshold: 1.0,
                icon: pantry::DEFAULT_ICON.to_string(),
                added_by: grocery.added_by.clone(),
                created_at: now,
                updated_at: now,
            };
            pantry_item.insert(&mut tx).await?;

            sqlx::query("DELETE FROM grocery_item WHERE id = ?1 AND owner_id = ?2")
                .bind(&grocery.id)
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
        }

        let count = moving.len();
        ActivityLog::append_with(
            &mut tx,
            owner_id,
            NewActivity::by_owner(format!("Moved {} items to pantry", count), "📦")
                .with_metadata(serde_json::json!({ "count": count })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(owner_id, count, "Moved grocery items to pantry");
        Ok(count)
    }
}

#[async_trait]
impl OwnedStore for GroceryStore {
    type Resource = GroceryItem;
    const LABEL: &'static str = "Item";

    async fn find_by_id(&self, id: &str) -> PantryResult<Option<GroceryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM grocery_item WHERE id = ?1",
            GroceryItem::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(GroceryItem::from_row).transpose()
    }
}
