/// Grocery list endpoints
use super::MessageResponse;
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::PantryResult,
    ledger::grocery::{GroceryAdd, GroceryItem, GroceryItemPatch, NewGroceryItem},
    validation::ApiJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build grocery routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/grocery", get(list_items).post(add_item))
        .route("/grocery/move-to-pantry", post(move_to_pantry))
        .route(
            "/grocery/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveToPantryRequest {
    #[serde(default)]
    item_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MoveToPantryResponse {
    message: String,
    moved: usize,
}

async fn list_items(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> PantryResult<Json<Vec<GroceryItem>>> {
    Ok(Json(ctx.grocery.list(&auth.account_id).await?))
}

/// 201 for a new item, 200 when an existing item absorbed the add
async fn add_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<NewGroceryItem>,
) -> PantryResult<(StatusCode, Json<GroceryItem>)> {
    let added = ctx.grocery.add(&auth.account_id, req).await?;
    let status = match added {
        GroceryAdd::Created(_) => StatusCode::CREATED,
        GroceryAdd::Merged(_) => StatusCode::OK,
    };
    Ok((status, Json(added.into_item())))
}

async fn get_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> PantryResult<Json<GroceryItem>> {
    Ok(Json(ctx.grocery.get(&auth.account_id, &id).await?))
}

async fn update_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<GroceryItemPatch>,
) -> PantryResult<Json<GroceryItem>> {
    Ok(Json(ctx.grocery.update(&auth.account_id, &id, patch).await?))
}

async fn delete_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> PantryResult<Json<MessageResponse>> {
    ctx.grocery.delete(&auth.account_id, &id).await?;
    Ok(Json(MessageResponse::new("Item removed")))
}

async fn move_to_pantry(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<MoveToPantryRequest>,
) -> PantryResult<Json<MoveToPantryResponse>> {
    let moved = ctx
        .grocery
        .move_to_pantry(&auth.account_id, &req.item_ids)
        .await?;

    Ok(Json(MoveToPantryResponse {
        message: format!("Moved {} items to pantry", moved),
        moved,
    }))
}
