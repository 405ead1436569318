//! Shared helpers for the HTTP-level integration tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use shortlink::config::Config;
use shortlink::storage::Stores;
use shortlink::{create_app, AppState};
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "integration-pass";
pub const BASE_URL: &str = "https://sho.rt";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    pub token: String,
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| {
        let value = match key {
            "STORAGE_BACKEND" => "memory",
            "JWT_SECRET" => "integration-jwt-secret",
            "ADMIN_USERNAME" => ADMIN_USERNAME,
            "ADMIN_PASSWORD" => ADMIN_PASSWORD,
            "BASE_URL" => BASE_URL,
            "DEFAULT_DELAY_SECS" => "5",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

/// App over in-memory stores with the admin seeded and logged in
pub async fn spawn_app() -> TestApp {
    let state = Arc::new(AppState::new(&test_config(), Stores::memory()).unwrap());
    state.auth.bootstrap().await.unwrap();
    let router = create_app(Arc::clone(&state));

    let response = send(
        &router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    TestApp {
        state,
        router,
        token,
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

impl TestApp {
    pub async fn api(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        send(&self.router, method, uri, Some(&self.token), body).await
    }

    /// Create a link and return its short code
    pub async fn create_link(&self, body: Value) -> String {
        let response = self.api(Method::POST, "/api/links", Some(body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["shortCode"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Follow `/s/{code}` as a browser would, with optional extra headers
    pub async fn visit(&self, code: &str, headers: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder().uri(format!("/s/{code}"));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// Let queued click recordings finish
    pub async fn settle(&self) {
        self.state.tasks.wait_idle().await;
    }
}
