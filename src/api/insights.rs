/// Shopping suggestion endpoint
use crate::{auth::AuthContext, context::AppContext, error::PantryResult, insights::Insights};
use axum::{extract::State, routing::get, Json, Router};

/// Build insight routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/insights/suggestions", get(suggestions))
}

/// Suggestions from the caller's pantry and grocery list; falls back to static tips
async fn suggestions(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> PantryResult<Json<Insights>> {
    let (pantry, grocery) = futures::try_join!(
        ctx.pantry.list(&auth.account_id),
        ctx.grocery.list(&auth.account_id),
    )?;

    Ok(Json(ctx.insights.suggestions(&pantry, &grocery).await))
}
