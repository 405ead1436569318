//! Redirect integration tests
//!
//! Drive `/s/{code}` through the full router and check both the response and
//! the click bookkeeping that happens in the background.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{body_json, body_text, spawn_app};
use serde_json::json;
use shortlink::now_millis;

#[tokio::test]
async fn test_interstitial_flow_counts_click() {
    let app = spawn_app().await;
    let code = app
        .create_link(json!({
            "url": "https://example.com/docs",
            "customSuffix": "docs",
            "title": "Docs",
            "showInterstitial": true,
            "delay": 5
        }))
        .await;
    assert_eq!(code, "docs");

    let response = app.visit("docs", &[("user-agent", "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0")]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let body = body_text(response).await;
    assert!(body.contains(r#"<span id="countdown">5</span>"#));
    assert!(body.contains("https://example.com/docs"));

    app.settle().await;

    let link = body_json(app.api(Method::GET, "/api/links/docs", None).await).await;
    assert_eq!(link["clicks"], 1);
    assert!(link["lastClickedAt"].as_i64().is_some());
}

#[tokio::test]
async fn test_direct_redirect_is_302() {
    let app = spawn_app().await;
    let code = app
        .create_link(json!({ "url": "https://example.com/direct", "showInterstitial": false }))
        .await;
    assert_eq!(code.len(), 6);

    let response = app.visit(&code, &[]).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://example.com/direct"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_default_delay_applies_when_unset() {
    let app = spawn_app().await;
    app.create_link(json!({ "url": "https://example.com", "customSuffix": "dflt" }))
        .await;

    let body = body_text(app.visit("dflt", &[]).await).await;
    assert!(body.contains(r#"<span id="countdown">5</span>"#));
}

#[tokio::test]
async fn test_disabled_link_is_403_and_not_counted() {
    let app = spawn_app().await;
    app.create_link(json!({ "url": "https://example.com", "customSuffix": "paused" }))
        .await;

    let response = app
        .api(Method::PUT, "/api/links/paused", Some(json!({ "active": false })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.visit("paused", &[]).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_text(response).await.contains("Link disabled"));

    app.settle().await;
    let link = body_json(app.api(Method::GET, "/api/links/paused", None).await).await;
    assert_eq!(link["clicks"], 0);
}

#[tokio::test]
async fn test_expired_link_is_410() {
    let app = spawn_app().await;
    app.create_link(json!({
        "url": "https://example.com",
        "customSuffix": "stale",
        "expiresAt": now_millis() - 60_000
    }))
    .await;

    let response = app.visit("stale", &[]).await;
    assert_eq!(response.status(), StatusCode::GONE);
    assert!(body_text(response).await.contains("Link expired"));
}

#[tokio::test]
async fn test_unknown_code_is_404_page() {
    let app = spawn_app().await;
    let response = app.visit("nope404", &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Link not found"));
}

#[tokio::test]
async fn test_trailing_path_segments_are_ignored() {
    let app = spawn_app().await;
    app.create_link(json!({
        "url": "https://example.com/target",
        "customSuffix": "nested",
        "showInterstitial": false
    }))
    .await;

    for path in ["nested/", "nested/extra/segments"] {
        let response = app.visit(path, &[]).await;
        assert_eq!(response.status(), StatusCode::FOUND, "path {path}");
    }
}

#[tokio::test]
async fn test_every_visit_is_counted() {
    let app = spawn_app().await;
    app.create_link(json!({
        "url": "https://example.com",
        "customSuffix": "popular",
        "showInterstitial": false
    }))
    .await;

    for i in 0..12 {
        let ip = format!("203.0.113.{i}");
        let response = app
            .visit("popular", &[("x-forwarded-for", ip.as_str()), ("cf-ipcountry", "DE")])
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
    }
    app.settle().await;

    let link = body_json(app.api(Method::GET, "/api/links/popular", None).await).await;
    assert_eq!(link["clicks"], 12);

    let analytics = body_json(app.api(Method::GET, "/api/analytics/popular", None).await).await;
    assert_eq!(analytics["totalClicks"], 12);
    assert_eq!(analytics["countries"][0]["name"], "DE");
    assert_eq!(analytics["countries"][0]["value"], 12);
}
