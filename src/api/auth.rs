/// Signup, email verification, login and current-account endpoints
use crate::{
    account::{LoginRequest, SessionResponse, SignupRequest, SignupResponse, VerifyEmailRequest},
    auth::AuthContext,
    context::AppContext,
    db::account::AccountView,
    error::PantryResult,
    validation::ApiJson,
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

/// Create an unverified account and send its verification code
async fn signup(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> PantryResult<(StatusCode, Json<SignupResponse>)> {
    let outcome = ctx
        .accounts
        .request_signup(&req.name, &req.email, &req.password)
        .await?;

    let message = if outcome.email_queued {
        "Verification code sent to email"
    } else {
        "Account created but failed to send email. Contact support."
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: message.to_string(),
            email: outcome.account.email,
            is_verified: false,
        }),
    ))
}

/// Consume a verification code and log the account in
async fn verify_email(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<VerifyEmailRequest>,
) -> PantryResult<Json<SessionResponse>> {
    let (account, token) = ctx.accounts.verify_email(&req.email, req.code.trim()).await?;
    Ok(Json(SessionResponse::new(token, &account.view())))
}

/// Password login
async fn login(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> PantryResult<Json<SessionResponse>> {
    let (account, token) = ctx.accounts.login(&req.email, &req.password).await?;
    Ok(Json(SessionResponse::new(token, &account.view())))
}

/// The caller's own account
async fn me(State(ctx): State<AppContext>, auth: AuthContext) -> PantryResult<Json<AccountView>> {
    let account = ctx.accounts.get_account(&auth.account_id).await?;
    Ok(Json(account.view()))
}
