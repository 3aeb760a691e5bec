/// HTTP server setup and routing
use crate::{
    api::middleware::track_metrics,
    context::AppContext,
    error::{PantryError, PantryResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::Json,
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(crate::api::routes())
        .fallback(not_found)
        // Converts Router<AppContext> to Router<()>
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(middleware::from_fn(track_metrics))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> PantryResult<()> {
    let addr = ctx.bind_address();

    info!("PantryIQ listening on {}", addr);
    info!("   Public URL: {}", ctx.config.service.public_url);
    info!("   Frontend URL: {}", ctx.config.service.frontend_url);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PantryError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    // Peer addresses key the anonymous rate-limit buckets
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| PantryError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
