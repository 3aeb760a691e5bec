//! Shared helpers for router-level tests
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use pantryiq::{config::ServerConfig, context::AppContext, server};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub ctx: AppContext,
    pub router: Router,
    // Keeps the database directory alive for the test's duration
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_testing(dir.path().join("pantry.sqlite"));
        let ctx = AppContext::new(config).await.unwrap();
        let router = server::build_router(ctx.clone());
        Self {
            ctx,
            router,
            _dir: dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            location,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    /// The six-digit code from the latest verification email
    pub async fn verification_code(&self, email: &str) -> String {
        let messages = self.ctx.outbox.messages_for(email).await.unwrap();
        let body = &messages.first().unwrap().email.body;
        body.lines()
            .map(str::trim)
            .find(|line| line.len() == 6 && line.chars().all(|c| c.is_ascii_digit()))
            .unwrap()
            .to_string()
    }

    /// The invite token embedded in the latest invitation link sent to `email`
    pub async fn invite_token(&self, email: &str) -> String {
        let messages = self.ctx.outbox.messages_for(email).await.unwrap();
        let body = &messages.first().unwrap().email.body;
        let marker = "/family/verify/";
        let start = body.find(marker).unwrap() + marker.len();
        body[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect()
    }

    /// Sign up, verify and return a session token
    pub async fn verified_account(&self, name: &str, email: &str) -> String {
        let res = self
            .post(
                "/auth/signup",
                None,
                serde_json::json!({ "name": name, "email": email, "password": "hunter22" }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);

        let code = self.verification_code(email).await;
        let res = self
            .post(
                "/auth/verify-email",
                None,
                serde_json::json!({ "email": email, "code": code }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);
        res.body["token"].as_str().unwrap().to_string()
    }
}
