/// Meal planner endpoints
use super::MessageResponse;
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::PantryResult,
    ledger::meals::{DateRange, MealPlan, MealPlanPatch, NewMealPlan},
    validation::ApiJson,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

/// Build meal routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/meals", get(list_meals).post(create_meal))
        .route(
            "/meals/:id",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MealsQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

async fn list_meals(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<MealsQuery>,
) -> PantryResult<Json<Vec<MealPlan>>> {
    let range = DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?;
    Ok(Json(ctx.meals.list(&auth.account_id, range).await?))
}

async fn create_meal(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<NewMealPlan>,
) -> PantryResult<(StatusCode, Json<MealPlan>)> {
    let meal = ctx.meals.create(&auth.account_id, req).await?;
    Ok((StatusCode::CREATED, Json(meal)))
}

async fn get_meal(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> PantryResult<Json<MealPlan>> {
    Ok(Json(ctx.meals.get(&auth.account_id, &id).await?))
}

async fn update_meal(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<MealPlanPatch>,
) -> PantryResult<Json<MealPlan>> {
    Ok(Json(ctx.meals.update(&auth.account_id, &id, patch).await?))
}

async fn delete_meal(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> PantryResult<Json<MessageResponse>> {
    ctx.meals.delete(&auth.account_id, &id).await?;
    Ok(Json(MessageResponse::new("Meal plan removed")))
}
