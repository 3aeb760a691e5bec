/// Meal plans
use super::{require_owned, text_enum, Owned, OwnedStore};
use crate::{
    activity::{ActivityLog, NewActivity},
    error::PantryResult,
    validation::{parse_date, require_text},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_ICON: &str = "🍽️";

text_enum! {
    pub enum MealType ("meal type") {
        Breakfast => "breakfast",
        Lunch => "lunch",
        Dinner => "dinner",
        Snack => "snack",
    }
}

/// One ingredient of a planned meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub in_pantry: bool,
}

/// Meal plan record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub id: String,
    #[serde(skip)]
    pub owner_id: String,
    pub date: DateTime<Utc>,
    pub meal_type: MealType,
    pub recipe_name: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Option<String>,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    pub calories: Option<f64>,
    /// Minutes
    pub prep_time: Option<i64>,
    pub icon: String,
    pub created_at: DateTime<Utc>,
}

impl MealPlan {
    const COLUMNS: &'static str = "id, owner_id, date, meal_type, recipe_name, ingredients, \
         instructions, is_ai_generated, calories, prep_time, icon, created_at";

    fn from_row(row: &SqliteRow) -> PantryResult<Self> {
        let meal_type: String = row.try_get("meal_type")?;
        let ingredients: String = row.try_get("ingredients")?;

        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            date: row.try_get("date")?,
            meal_type: MealType::parse(&meal_type)?,
            recipe_name: row.try_get("recipe_name")?,
            ingredients: serde_json::from_str(&ingredients).unwrap_or_default(),
            instructions: row.try_get("instructions")?,
            is_ai_generated: row.try_get("is_ai_generated")?,
            calories: row.try_get("calories")?,
            prep_time: row.try_get("prep_time")?,
            icon: row.try_get("icon")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn ingredients_json(&self) -> String {
        serde_json::to_string(&self.ingredients).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Owned for MealPlan {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// New meal plan request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewMealPlan {
    pub date: String,
    pub meal_type: MealType,
    pub recipe_name: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    pub instructions: Option<String>,
    #[serde(default, rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    #[validate(range(min = 0.0, message = "Calories must be non-negative"))]
    pub calories: Option<f64>,
    #[validate(range(min = 0, message = "Prep time must be non-negative"))]
    pub prep_time: Option<i64>,
    pub icon: Option<String>,
}

/// Partial meal plan update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanPatch {
    pub date: Option<String>,
    pub meal_type: Option<MealType>,
    pub recipe_name: Option<String>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub instructions: Option<String>,
    #[validate(range(min = 0.0, message = "Calories must be non-negative"))]
    pub calories: Option<f64>,
    #[validate(range(min = 0, message = "Prep time must be non-negative"))]
    pub prep_time: Option<i64>,
    pub icon: Option<String>,
}

/// Inclusive date window for listing meals
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Build from optional `startDate` / `endDate` query values
    pub fn parse(start: Option<&str>, end: Option<&str>) -> PantryResult<Self> {
        Ok(Self {
            start: start.map(|s| parse_date("startDate", s)).transpose()?,
            end: end.map(|s| parse_date("endDate", s)).transpose()?,
        })
    }
}

/// Meal plan store
#[derive(Clone)]
pub struct MealStore {
    db: SqlitePool,
    activity: ActivityLog,
}

impl MealStore {
    pub fn new(db: SqlitePool, activity: ActivityLog) -> Self {
        Self { db, activity }
    }

    /// Owner's meals within the range, by date then meal type
    pub async fn list(&self, owner_id: &str, range: DateRange) -> PantryResult<Vec<MealPlan>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM meal_plan WHERE owner_id = ",
            MealPlan::COLUMNS
        ));
        query.push_bind(owner_id);

        if let Some(start) = range.start {
            query.push(" AND date >= ").push_bind(start);
        }
        if let Some(end) = range.end {
            query.push(" AND date <= ").push_bind(end);
        }
        query.push(" ORDER BY date, meal_type");

        let rows = query.build().fetch_all(&self.db).await?;
        rows.iter().map(MealPlan::from_row).collect()
    }

    pub async fn count_between(
        &self,
        owner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PantryResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM meal_plan WHERE owner_id = ?1 AND date >= ?2 AND date < ?3",
        )
        .bind(owner_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    pub async fn create(&self, owner_id: &str, request: NewMealPlan) -> PantryResult<MealPlan> {
        request.validate()?;
        let recipe_name = require_text(&request.recipe_name, "Recipe name is required")?;

        let meal = MealPlan {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            date: parse_date("date", &request.date)?,
            meal_type: request.meal_type,
            recipe_name,
            ingredients: request.ingredients,
            instructions: request.instructions,
            is_ai_generated: request.is_ai_generated,
            calories: request.calories,
            prep_time: request.prep_time,
            icon: request.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO meal_plan (id, owner_id, date, meal_type, recipe_name, ingredients, instructions,
                                   is_ai_generated, calories, prep_time, icon, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&meal.id)
        .bind(&meal.owner_id)
        .bind(meal.date)
        .bind(meal.meal_type.as_str())
        .bind(&meal.recipe_name)
        .bind(meal.ingredients_json())
        .bind(&meal.instructions)
        .bind(meal.is_ai_generated)
        .bind(meal.calories)
        .bind(meal.prep_time)
        .bind(&meal.icon)
        .bind(meal.created_at)
        .execute(&self.db)
        .await?;

        self.activity
            .record(
                owner_id,
                NewActivity::by_owner(format!("Planned meal: {}", meal.recipe_name), DEFAULT_ICON)
                    .with_metadata(serde_json::json!({ "mealId": meal.id })),
            )
            .await;

        Ok(meal)
    }

    pub async fn get(&self, owner_id: &str, id: &str) -> PantryResult<MealPlan> {
        require_owned(self, id, owner_id).await
    }

    pub async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: MealPlanPatch,
    ) -> PantryResult<MealPlan> {
        let mut meal = require_owned(self, id, owner_id).await?;
        patch.validate()?;

        if let Some(date) = patch.date {
            meal.date = parse_date("date", &date)?;
        }
        if let Some(meal_type) = patch.meal_type {
            meal.meal_type = meal_type;
        }
        if let Some(recipe_name) = patch.recipe_name {
            meal.recipe_name = require_text(&recipe_name, "Recipe name is required")?;
        }
        if let Some(ingredients) = patch.ingredients {
            meal.ingredients = ingredients;
        }
        if let Some(instructions) = patch.instructions {
            meal.instructions = Some(instructions);
        }
        if let Some(calories) = patch.calories {
            meal.calories = Some(calories);
        }
        if let Some(prep_time) = patch.prep_time {
            meal.prep_time = Some(prep_time);
        }
        if let Some(icon) = patch.icon {
            meal.icon = icon;
        }

        sqlx::query(
            r#"
            UPDATE meal_plan
            SET date = ?1, meal_type = ?2, recipe_name = ?3, ingredients = ?4, instructions = ?5,
                calories = ?6, prep_time = ?7, icon = ?8
            WHERE id = ?9 AND owner_id = ?10
            "#,
        )
        .bind(meal.date)
        .bind(meal.meal_type.as_str())
        .bind(&meal.recipe_name)
        .bind(meal.ingredients_json())
        .bind(&meal.instructions)
        .bind(meal.calories)
        .bind(meal.prep_time)
        .bind(&meal.icon)
        .bind(&meal.id)
        .bind(owner_id)
        .execute(&self.db)
        .await?;

        Ok(meal)
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> PantryResult<()> {
        let meal = require_owned(self, id, owner_id).await?;

        sqlx::query("DELETE FROM meal_plan WHERE id = ?1 AND owner_id = ?2")
            .bind(&meal.id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl OwnedStore for MealStore {
    type Resource = MealPlan;
    const LABEL: &'static str = "Meal plan";

    async fn find_by_id(&self, id: &str) -> PantryResult<Option<MealPlan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM meal_plan WHERE id = ?1",
            MealPlan::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(MealPlan::from_row).transpose()
    }
}
