/// Family sharing endpoints
use crate::{
    activity::ActivityRecord,
    auth::AuthContext,
    context::AppContext,
    db::account::FamilyMember,
    error::PantryResult,
    family::InviteRequest,
    validation::ApiJson,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

const RECENT_ACTIVITY_LIMIT: i64 = 20;

/// Build family routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/family", get(overview))
        .route("/family/invite", post(invite))
        .route("/family/verify/:token", get(accept_invite))
}

#[derive(Debug, Serialize)]
struct FamilyOverview {
    members: Vec<FamilyMember>,
    activities: Vec<ActivityRecord>,
}

/// Members plus recent activity
async fn overview(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> PantryResult<Json<FamilyOverview>> {
    let (members, activities) = futures::try_join!(
        ctx.family.list_members(&auth.account_id),
        ctx.activity.recent(&auth.account_id, RECENT_ACTIVITY_LIMIT),
    )?;

    Ok(Json(FamilyOverview {
        members,
        activities,
    }))
}

/// Invite a family member; returns the caller's member list
async fn invite(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<InviteRequest>,
) -> PantryResult<Json<Vec<FamilyMember>>> {
    let members = ctx.family.invite(&auth.account_id, req).await?;
    Ok(Json(members))
}

/// Follow an invitation link; redirects to the frontend on success
async fn accept_invite(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> PantryResult<Response> {
    ctx.family.accept_invite(&token).await?;

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, ctx.family.confirmation_url())],
    )
        .into_response())
}
