//! HTTP API tests
//!
//! Drives the router directly with `tower::ServiceExt::oneshot`, so no
//! listener or live broker is involved.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use notify_relay::api::{build_router, AppState};
use notify_relay::broker::BrokerClient;
use notify_relay::config::{BrokerConfig, StreamConfig};
use notify_relay::models::{NotificationInput, NotificationType};
use notify_relay::service::NotificationService;
use notify_relay::storage::{InMemoryNotificationRepository, NotificationRepository};
use notify_relay::stream::StreamBroadcaster;

struct TestApp {
    router: Router,
    repository: Arc<InMemoryNotificationRepository>,
}

fn test_app() -> TestApp {
    let config = BrokerConfig::default();
    let broadcaster = Arc::new(StreamBroadcaster::new(&StreamConfig {
        heartbeat_interval_secs: 300,
    }));
    let repository = Arc::new(InMemoryNotificationRepository::new(50));
    let service = Arc::new(NotificationService::new(
        &config,
        BrokerClient::new(config.clone()),
        broadcaster.clone(),
        repository.clone(),
    ));

    let state = AppState::new(service, broadcaster, repository.clone());
    TestApp {
        router: build_router(state),
        repository,
    }
}

fn input(title: &str) -> NotificationInput {
    NotificationInput {
        kind: NotificationType::Info,
        title: title.to_string(),
        message: None,
        pr_number: None,
        job_id: None,
        environment: None,
        blueprint: None,
        url: None,
        read: false,
        timestamp: chrono::Utc::now(),
    }
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    request_json(router, "GET", uri).await
}

async fn request_json(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app();
    let (status, body) = get_json(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_list_notifications() {
    let app = test_app();
    app.repository.add(input("first")).await.unwrap();
    app.repository.add(input("second")).await.unwrap();

    let (status, body) = get_json(&app.router, "/api/notifications").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["unreadCount"], 2);
    // newest first
    assert_eq!(body["notifications"][0]["title"], "second");
    assert_eq!(body["notifications"][1]["title"], "first");
}

#[tokio::test]
async fn test_list_with_limit_and_unread_filter() {
    let app = test_app();
    let stored = app.repository.add(input("seen")).await.unwrap();
    app.repository.add(input("fresh")).await.unwrap();
    app.repository.mark_as_read(&stored.id).await.unwrap();

    let (_, body) = get_json(&app.router, "/api/notifications?unread=true").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["notifications"][0]["title"], "fresh");

    let (_, body) = get_json(&app.router, "/api/notifications?limit=1").await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_get_and_mark_read() {
    let app = test_app();
    let stored = app.repository.add(input("review requested")).await.unwrap();

    let (status, body) = get_json(&app.router, &format!("/api/notifications/{}", stored.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read"], false);

    let (status, body) = request_json(
        &app.router,
        "PUT",
        &format!("/api/notifications/{}/read", stored.id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read"], true);
}

#[tokio::test]
async fn test_unknown_id_is_404() {
    let app = test_app();
    let (status, body) = get_json(&app.router, "/api/notifications/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_delete_all() {
    let app = test_app();
    app.repository.add(input("a")).await.unwrap();
    app.repository.add(input("b")).await.unwrap();

    let (status, body) = request_json(&app.router, "DELETE", "/api/notifications").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (_, body) = get_json(&app.router, "/api/notifications").await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_relay_status_shape() {
    let app = test_app();
    let (status, body) = get_json(&app.router, "/api/notifications/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isConsuming"], false);
    assert_eq!(body["broker"]["connected"], false);
    assert_eq!(body["stream"]["connectedClients"], 0);
}

#[tokio::test]
async fn test_metrics_route_disabled_by_default() {
    let app = test_app();
    let (status, _) = get_json(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_route_serves_text_exposition() {
    let config = BrokerConfig::default();
    let broadcaster = Arc::new(StreamBroadcaster::new(&StreamConfig {
        heartbeat_interval_secs: 300,
    }));
    let repository = Arc::new(InMemoryNotificationRepository::new(50));
    let service = Arc::new(NotificationService::new(
        &config,
        BrokerClient::new(config.clone()),
        broadcaster.clone(),
        repository.clone(),
    ));
    let state =
        AppState::new(service, broadcaster.clone(), repository).with_prometheus(true);
    let router = build_router(state);

    // touch a metric so the exposition is non-trivial
    let (_id, _rx) = broadcaster.attach();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("stream_active_clients"));
}

#[tokio::test]
async fn test_stream_endpoint_headers() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/notifications/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-cache");
    assert_eq!(response.headers().get("x-accel-buffering").unwrap(), "no");
}
