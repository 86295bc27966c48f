//! Notification service
//!
//! Bridges the broker and the stream broadcaster and owns the
//! persist-then-broadcast ordering contract: a notification is broadcast
//! only after the repository has assigned it an id. A notification that
//! cannot be durably recorded is dropped rather than shown without an id —
//! clients use the id for later read/unread operations against the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerClient, BrokerEvent, BrokerStatus};
use crate::config::BrokerConfig;
use crate::error::{AppError, Result};
use crate::models::NotificationInput;
use crate::storage::NotificationRepository;
use crate::stream::{StreamBroadcaster, StreamStatus};

/// Merged service status, the shape served by the status endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub broker: BrokerStatus,
    pub stream: StreamStatus,
    pub is_consuming: bool,
}

/// Orchestrates broker consumption, persistence, and stream fan-out
pub struct NotificationService {
    broker: BrokerClient,
    broadcaster: Arc<StreamBroadcaster>,
    repository: Arc<dyn NotificationRepository>,
    exchange: String,
    queue: String,
    routing_pattern: String,
    consuming: AtomicBool,
}

impl NotificationService {
    pub fn new(
        config: &BrokerConfig,
        broker: BrokerClient,
        broadcaster: Arc<StreamBroadcaster>,
        repository: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            broker,
            broadcaster,
            repository,
            exchange: config.exchange.clone(),
            queue: config.queue.clone(),
            routing_pattern: config.routing_pattern.clone(),
            consuming: AtomicBool::new(false),
        }
    }

    /// Start the service. Subscribes to broker lifecycle events *before*
    /// attempting the connection: a first attempt can fail and a background
    /// retry succeed after this method has returned, and the consumer must
    /// still be established when that happens. Returns whether the initial
    /// connection attempt succeeded; a false return is not an error.
    pub async fn initialize(self: &Arc<Self>) -> bool {
        let mut events = self.broker.subscribe();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(BrokerEvent::Connected) => service.on_broker_connected().await,
                    Ok(BrokerEvent::Disconnected) => {
                        warn!("Broker disconnected - consumer suspended");
                    }
                    Ok(BrokerEvent::Error(e)) => {
                        warn!(error = %e, "Broker error");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Lagged on broker events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.broker.connect().await
    }

    /// Runs on every `Connected` event, initial connect and reconnects
    /// alike: reset the consuming flag so consumption restarts, re-declare
    /// topology, re-register the consumer.
    async fn on_broker_connected(self: &Arc<Self>) {
        info!("Broker connected - establishing consumer");
        self.consuming.store(false, Ordering::SeqCst);
        if let Err(e) = self
            .broker
            .declare_topology(&self.exchange, &self.queue, &self.routing_pattern)
            .await
        {
            error!(error = %e, "Failed to declare broker topology");
            return;
        }
        self.start_consuming().await;
    }

    /// Register the message handler with the broker. Idempotent: a second
    /// call while already consuming is a no-op.
    pub async fn start_consuming(self: &Arc<Self>) {
        if self.consuming.swap(true, Ordering::SeqCst) {
            debug!("Already consuming");
            return;
        }

        let service = Arc::clone(self);
        let result = self
            .broker
            .consume(&self.queue, move |message| {
                let service = Arc::clone(&service);
                async move { service.handle(message).await }
            })
            .await;

        match result {
            Ok(()) => info!(queue = %self.queue, "Consuming notifications"),
            Err(e) => {
                self.consuming.store(false, Ordering::SeqCst);
                error!(error = %e, "Failed to start consuming");
            }
        }
    }

    /// Process one decoded broker message: persist first, broadcast second.
    /// Persistence failure drops the notification without broadcasting —
    /// fail closed, so clients never see a notification the store cannot
    /// resolve later.
    pub async fn handle(&self, message: serde_json::Value) -> Result<()> {
        let input: NotificationInput = serde_json::from_value(message)
            .map_err(|e| AppError::Validation(format!("invalid notification message: {}", e)))?;

        debug!(title = %input.title, "Processing notification");

        let persisted = match self.repository.add(input).await {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(error = %e, "Failed to persist notification - dropped without broadcast");
                return Err(e);
            }
        };

        let sent = self.broadcaster.broadcast(&persisted);
        debug!(id = %persisted.id, sent, "Notification relayed");
        Ok(())
    }

    /// Merged broker + stream status
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            broker: self.broker.status(),
            stream: self.broadcaster.status(),
            is_consuming: self.consuming.load(Ordering::SeqCst),
        }
    }

    /// Stop consuming, drop all stream clients, close the broker.
    pub async fn stop(&self) {
        self.consuming.store(false, Ordering::SeqCst);
        self.broker.close().await;
        self.broadcaster.teardown_all();
        info!("Notification service stopped");
    }
}
