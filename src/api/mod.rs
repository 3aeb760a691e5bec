/// API routes and handlers
pub mod auth;
pub mod dashboard;
pub mod family;
pub mod grocery;
pub mod health;
pub mod insights;
pub mod meals;
pub mod middleware;
pub mod pantry;

use crate::context::AppContext;
use axum::Router;
use serde::Serialize;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(family::routes())
        .merge(pantry::routes())
        .merge(grocery::routes())
        .merge(meals::routes())
        .merge(dashboard::routes())
        .merge(insights::routes())
}

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
