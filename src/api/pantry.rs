/// Pantry endpoints
use super::MessageResponse;
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::PantryResult,
    ledger::pantry::{NewPantryItem, PantryItemPatch, PantryItemView},
    validation::ApiJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

/// Build pantry routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/pantry", get(list_items).post(create_item))
        .route(
            "/pantry/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
}

async fn list_items(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> PantryResult<Json<Vec<PantryItemView>>> {
    let items = ctx.pantry.list(&auth.account_id).await?;
    Ok(Json(items.into_iter().map(|i| i.view()).collect()))
}

async fn create_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<NewPantryItem>,
) -> PantryResult<(StatusCode, Json<PantryItemView>)> {
    let item = ctx.pantry.create(&auth.account_id, req).await?;
    Ok((StatusCode::CREATED, Json(item.view())))
}

async fn get_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> PantryResult<Json<PantryItemView>> {
    let item = ctx.pantry.get(&auth.account_id, &id).await?;
    Ok(Json(item.view()))
}

async fn update_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<PantryItemPatch>,
) -> PantryResult<Json<PantryItemView>> {
    let item = ctx.pantry.update(&auth.account_id, &id, patch).await?;
    Ok(Json(item.view()))
}

async fn delete_item(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> PantryResult<Json<MessageResponse>> {
    ctx.pantry.delete(&auth.account_id, &id).await?;
    Ok(Json(MessageResponse::new("Item removed")))
}
