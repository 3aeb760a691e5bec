/// Health and metrics endpoints
///
/// `/health` reports database reachability and uptime. A failing database
/// check returns 503 so load balancers stop routing to this instance.
use crate::{context::AppContext, jobs, metrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "degraded"
    pub status: String,

    pub version: String,

    pub uptime_seconds: f64,

    pub checks: Vec<ComponentHealth>,
}

/// Health status of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,

    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
}

async fn health(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let checks = vec![check_database(&ctx).await];
    let status = overall_status(&checks);

    let code = if status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthStatus {
            status: status.to_string(),
            version: ctx.config.service.version.clone(),
            uptime_seconds: metrics::UPTIME_SECONDS.get(),
            checks,
        }),
    )
}

/// Prometheus scrape endpoint
async fn metrics_text() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
        .into_response()
}

async fn check_database(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    match jobs::tasks::health_check(ctx).await {
        Ok(()) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            ComponentHealth {
                name: "database".to_string(),
                status: "degraded".to_string(),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
                error: Some(e.to_string()),
            }
        }
    }
}

fn overall_status(checks: &[ComponentHealth]) -> &'static str {
    if checks.iter().all(|c| c.status == "healthy") {
        "healthy"
    } else {
        "degraded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(status: &str) -> ComponentHealth {
        ComponentHealth {
            name: "database".to_string(),
            status: status.to_string(),
            response_time_ms: Some(2),
            error: None,
        }
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(overall_status(&[component("healthy")]), "healthy");
        assert_eq!(
            overall_status(&[component("healthy"), component("degraded")]),
            "degraded"
        );
    }

    #[test]
    fn test_component_serialization_skips_empty_error() {
        let json = serde_json::to_value(component("healthy")).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json.get("error").is_none());
    }
}
