//! Notification relay integration tests
//!
//! Exercises the broker-message-to-SSE-frame pipeline end to end without a
//! live broker: messages are fed straight into the service handler and the
//! resulting frames observed on attached stream clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::timeout;

use notify_relay::broker::BrokerClient;
use notify_relay::config::{BrokerConfig, StreamConfig};
use notify_relay::error::{AppError, Result};
use notify_relay::models::{Notification, NotificationInput, NotificationType};
use notify_relay::service::NotificationService;
use notify_relay::storage::{InMemoryNotificationRepository, NotificationRepository};
use notify_relay::stream::{StreamBroadcaster, StreamFrame};

/// Repository that refuses every write, for fail-closed tests
struct FailingRepository;

#[async_trait]
impl NotificationRepository for FailingRepository {
    async fn add(&self, _input: NotificationInput) -> Result<Notification> {
        Err(AppError::Storage("disk full".to_string()))
    }

    async fn get_all(&self, _limit: usize, _unread_only: bool) -> Result<Vec<Notification>> {
        Ok(vec![])
    }

    async fn get_by_id(&self, _id: &str) -> Result<Option<Notification>> {
        Ok(None)
    }

    async fn mark_as_read(&self, _id: &str) -> Result<Option<Notification>> {
        Ok(None)
    }

    async fn mark_all_as_read(&self) -> Result<usize> {
        Ok(0)
    }

    async fn delete(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn delete_all(&self) -> Result<usize> {
        Ok(0)
    }

    async fn unread_count(&self) -> Result<usize> {
        Ok(0)
    }
}

fn build_service(repository: Arc<dyn NotificationRepository>) -> Arc<NotificationService> {
    let config = BrokerConfig::default();
    let broadcaster = Arc::new(StreamBroadcaster::new(&StreamConfig {
        heartbeat_interval_secs: 300,
    }));
    Arc::new(NotificationService::new(
        &config,
        BrokerClient::new(config.clone()),
        broadcaster,
        repository,
    ))
}

async fn next_frame(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<StreamFrame>,
) -> StreamFrame {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("stream closed")
}

#[tokio::test]
async fn test_message_reaches_attached_clients() {
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

    let (_id_a, mut rx_a) = broadcaster.attach();
    let (_id_b, mut rx_b) = broadcaster.attach();

    // both clients get their connected frame first
    assert!(matches!(
        next_frame(&mut rx_a).await,
        StreamFrame::Event { ref name, .. } if name == "connected"
    ));
    assert!(matches!(
        next_frame(&mut rx_b).await,
        StreamFrame::Event { ref name, .. } if name == "connected"
    ));

    service
        .handle(json!({
            "type": "error",
            "title": "Build failed",
            "message": "CI pipeline broke on main",
            "prNumber": 42
        }))
        .await
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        match next_frame(rx).await {
            StreamFrame::Event { name, data } => {
                assert_eq!(name, "notification");
                assert_eq!(data["title"], "Build failed");
                assert_eq!(data["type"], "error");
                assert_eq!(data["prNumber"], 42);
                // broadcast happens after persistence, so the id is present
                assert!(data["id"].as_str().is_some_and(|id| !id.is_empty()));
            }
            other => panic!("expected notification frame, got {:?}", other),
        }
    }

    let stored = repository.get_all(10, false).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, NotificationType::Error);
}

#[tokio::test]
async fn test_dropped_client_does_not_block_others() {
    let config = BrokerConfig::default();
    let broadcaster = Arc::new(StreamBroadcaster::new(&StreamConfig {
        heartbeat_interval_secs: 300,
    }));
    let service = Arc::new(NotificationService::new(
        &config,
        BrokerClient::new(config.clone()),
        broadcaster.clone(),
        Arc::new(InMemoryNotificationRepository::new(50)),
    ));

    let (_a, mut rx_a) = broadcaster.attach();
    let (_b, rx_b) = broadcaster.attach();
    let (_c, mut rx_c) = broadcaster.attach();
    drop(rx_b);

    next_frame(&mut rx_a).await;
    next_frame(&mut rx_c).await;

    service
        .handle(json!({ "title": "Deploy started" }))
        .await
        .unwrap();

    for rx in [&mut rx_a, &mut rx_c] {
        match next_frame(rx).await {
            StreamFrame::Event { name, data } => {
                assert_eq!(name, "notification");
                assert_eq!(data["title"], "Deploy started");
            }
            other => panic!("expected notification frame, got {:?}", other),
        }
    }

    // the dead client was pruned during the broadcast
    assert_eq!(broadcaster.client_count(), 2);
}

#[tokio::test]
async fn test_persistence_failure_suppresses_broadcast() {
    let config = BrokerConfig::default();
    let broadcaster = Arc::new(StreamBroadcaster::new(&StreamConfig {
        heartbeat_interval_secs: 300,
    }));
    let service = Arc::new(NotificationService::new(
        &config,
        BrokerClient::new(config.clone()),
        broadcaster.clone(),
        Arc::new(FailingRepository),
    ));

    let (_id, mut rx) = broadcaster.attach();
    next_frame(&mut rx).await; // connected

    let result = service.handle(json!({ "title": "lost" })).await;
    assert!(matches!(result, Err(AppError::Storage(_))));

    // no notification frame follows the connected frame
    let outcome = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(outcome.is_err(), "no frame should arrive, got {:?}", outcome);
}

#[tokio::test]
async fn test_initialize_without_broker_configured() {
    let service = build_service(Arc::new(InMemoryNotificationRepository::new(50)));

    // no broker URL: initialize reports failure without taking anything down
    assert!(!service.initialize().await);

    let status = service.status();
    assert!(!status.broker.connected);
    assert!(!status.is_consuming);
    assert_eq!(status.broker.reconnect_attempts, 0);
}

#[tokio::test]
async fn test_malformed_message_leaves_store_untouched() {
    let repository = Arc::new(InMemoryNotificationRepository::new(50));
    let service = build_service(repository.clone());

    let result = service.handle(json!({ "type": "info" })).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(repository.get_all(10, false).await.unwrap().is_empty());
}
