//! AMQP broker client
//!
//! One `BrokerClient` owns one connection and one channel. Connect failures
//! and dropped connections never surface as errors to callers; they emit
//! lifecycle events and schedule a bounded-backoff reconnect in the
//! background. After the attempt cap is exhausted the client stays down until
//! process restart.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
        BasicRejectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;

use super::error::{BrokerError, BrokerResult};
use super::events::BrokerEvent;
use super::metrics::BROKER_METRICS;

/// Capacity of the lifecycle event channel; events are tiny and subscribers
/// drain them immediately, lagging only under pathological stalls.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Broker connection status snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStatus {
    pub connected: bool,
    pub reconnect_attempts: u32,
    pub consumers: Vec<String>,
}

struct ConnState {
    connection: Option<Connection>,
    channel: Option<Channel>,
}

struct ConsumerHandle {
    tag: String,
    task: JoinHandle<()>,
}

struct Inner {
    config: BrokerConfig,
    state: RwLock<ConnState>,
    connected: AtomicBool,
    connecting: AtomicBool,
    reconnect_attempts: AtomicU32,
    events: broadcast::Sender<BrokerEvent>,
    consumers: Mutex<HashMap<String, ConsumerHandle>>,
    lost_tx: mpsc::UnboundedSender<String>,
    lost_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    monitor_started: AtomicBool,
}

/// AMQP broker client with automatic reconnection
#[derive(Clone)]
pub struct BrokerClient {
    inner: Arc<Inner>,
}

impl BrokerClient {
    pub fn new(config: BrokerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(ConnState {
                    connection: None,
                    channel: None,
                }),
                connected: AtomicBool::new(false),
                connecting: AtomicBool::new(false),
                reconnect_attempts: AtomicU32::new(0),
                events,
                consumers: Mutex::new(HashMap::new()),
                lost_tx,
                lost_rx: Mutex::new(Some(lost_rx)),
                monitor_started: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to lifecycle events. Must be called before `connect` to
    /// observe a connection that succeeds asynchronously after a failed
    /// first attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<BrokerEvent> {
        self.inner.events.subscribe()
    }

    /// Attempt to connect. Returns whether this attempt succeeded; on
    /// failure a reconnect is scheduled in the background and no error is
    /// propagated.
    pub async fn connect(&self) -> bool {
        let Some(url) = self.inner.config.url.clone() else {
            info!("No broker URL configured - live notifications disabled");
            return false;
        };

        self.ensure_monitor();
        self.try_connect(&url).await
    }

    async fn try_connect(&self, url: &str) -> bool {
        // only one physical connection attempt at a time
        if self.inner.connecting.swap(true, Ordering::SeqCst) {
            debug!("Connection attempt already in flight");
            return false;
        }

        info!("Connecting to broker");
        let result = Connection::connect(url, ConnectionProperties::default()).await;

        let connection = match result {
            Ok(connection) => connection,
            Err(e) => {
                warn!(error = %e, "Broker connection failed");
                self.inner.connecting.store(false, Ordering::SeqCst);
                self.schedule_reconnect(url);
                return false;
            }
        };

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(error = %e, "Broker channel creation failed");
                self.inner.connecting.store(false, Ordering::SeqCst);
                self.schedule_reconnect(url);
                return false;
            }
        };

        // Route transport errors through the monitor task; the callback runs
        // on the transport's own executor where we cannot spawn directly.
        let events = self.inner.events.clone();
        let lost = self.inner.lost_tx.clone();
        let lost_url = url.to_string();
        connection.on_error(move |err| {
            let _ = events.send(BrokerEvent::Error(err.to_string()));
            let _ = lost.send(lost_url.clone());
        });

        {
            let mut state = self.inner.state.write();
            state.connection = Some(connection);
            state.channel = Some(channel);
        }
        self.inner.connected.store(true, Ordering::SeqCst);
        self.inner.reconnect_attempts.store(0, Ordering::SeqCst);
        self.inner.connecting.store(false, Ordering::SeqCst);
        BROKER_METRICS.connection_up.set(1);

        info!("Broker connected");
        let _ = self.inner.events.send(BrokerEvent::Connected);
        true
    }

    /// Spawn the task that turns transport error callbacks into disconnect
    /// handling. Started once, on the first `connect` call.
    fn ensure_monitor(&self) {
        if self.inner.monitor_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(mut rx) = self.inner.lost_rx.lock().take() else {
            return;
        };
        let client = self.clone();
        tokio::spawn(async move {
            while let Some(url) = rx.recv().await {
                client.connection_lost(&url);
            }
        });
    }

    fn connection_lost(&self, url: &str) {
        // Deliberate close also fires the error callback; `connected` is
        // already false by then and the signal is ignored.
        if !self.inner.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        BROKER_METRICS.connection_up.set(0);

        {
            let mut state = self.inner.state.write();
            state.connection = None;
            state.channel = None;
        }
        self.abort_consumers();

        warn!("Broker connection lost");
        let _ = self.inner.events.send(BrokerEvent::Disconnected);
        self.schedule_reconnect(url);
    }

    fn schedule_reconnect(&self, url: &str) {
        let attempts = self.inner.reconnect_attempts.load(Ordering::SeqCst);
        let max = self.inner.config.max_reconnect_attempts;

        let Some(attempt) = next_reconnect_attempt(attempts, max) else {
            error!(
                max_attempts = max,
                "Broker reconnect attempts exhausted - live notifications down until restart"
            );
            return;
        };
        self.inner.reconnect_attempts.store(attempt, Ordering::SeqCst);
        BROKER_METRICS.reconnects_scheduled.inc();

        let delay = reconnect_delay(self.inner.config.reconnect_delay_ms, attempt);
        warn!(
            attempt,
            max_attempts = max,
            delay_ms = delay.as_millis() as u64,
            "Scheduling broker reconnect"
        );

        let client = self.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.try_connect(&url).await;
        });
    }

    /// Idempotently declare the durable topic exchange, durable queue, and
    /// binding. Safe to call on every reconnect.
    pub async fn declare_topology(
        &self,
        exchange: &str,
        queue: &str,
        routing_pattern: &str,
    ) -> BrokerResult<()> {
        let channel = self.channel().ok_or(BrokerError::NotConnected)?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                queue,
                exchange,
                routing_pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            exchange,
            queue,
            pattern = routing_pattern,
            "Broker topology declared"
        );
        Ok(())
    }

    /// Register the single consumer for a queue. A consumer already
    /// registered for the same queue is replaced.
    ///
    /// Per delivery: JSON decode failure rejects without requeue and never
    /// reaches the handler; a handler error is logged and the message is
    /// still acknowledged, since redelivery cannot fix a handler bug and
    /// would risk duplicate side effects.
    pub async fn consume<F, Fut>(&self, queue: &str, handler: F) -> BrokerResult<()>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::error::Result<()>> + Send + 'static,
    {
        let channel = self.channel().ok_or(BrokerError::NotConnected)?;

        let tag = format!("notify-relay-{}", queue);
        let mut consumer = channel
            .basic_consume(
                queue,
                &tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        let queue_name = queue.to_string();
        let task = tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        warn!(queue = %queue_name, error = %e, "Consumer stream error");
                        break;
                    }
                };

                match decode_payload(&delivery.data) {
                    Ok(message) => {
                        BROKER_METRICS
                            .messages_consumed
                            .with_label_values(&[&queue_name])
                            .inc();

                        if let Err(e) = handler(message).await {
                            BROKER_METRICS
                                .handler_failures
                                .with_label_values(&[&queue_name])
                                .inc();
                            error!(queue = %queue_name, error = %e, "Message handler failed");
                        }
                        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                            warn!(queue = %queue_name, error = %e, "Failed to ack message");
                        }
                    }
                    Err(e) => {
                        BROKER_METRICS
                            .decode_rejections
                            .with_label_values(&[&queue_name])
                            .inc();
                        warn!(queue = %queue_name, error = %e, "Rejecting undecodable message");
                        if let Err(e) = delivery
                            .reject(BasicRejectOptions { requeue: false })
                            .await
                        {
                            warn!(queue = %queue_name, error = %e, "Failed to reject message");
                        }
                    }
                }
            }
            debug!(queue = %queue_name, "Consumer stream ended");
        });

        let replaced = self
            .inner
            .consumers
            .lock()
            .insert(queue.to_string(), ConsumerHandle { tag, task });
        if let Some(old) = replaced {
            old.task.abort();
        }

        info!(queue, "Started consuming");
        Ok(())
    }

    /// Best-effort publish. Returns false when no channel is open or the
    /// write fails; never errors.
    pub async fn publish<T: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &T,
    ) -> bool {
        let Some(channel) = self.channel() else {
            warn!("Cannot publish - broker not connected");
            return false;
        };

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to serialize payload");
                return false;
            }
        };

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2); // persistent

        match channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
        {
            Ok(_) => {
                debug!(exchange, routing_key, "Published message");
                true
            }
            Err(e) => {
                warn!(exchange, routing_key, error = %e, "Publish failed");
                false
            }
        }
    }

    /// Cancel all consumers and close channel then connection. Idempotent.
    pub async fn close(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        BROKER_METRICS.connection_up.set(0);

        let handles: Vec<ConsumerHandle> = {
            let mut consumers = self.inner.consumers.lock();
            consumers.drain().map(|(_, handle)| handle).collect()
        };

        let (channel, connection) = {
            let mut state = self.inner.state.write();
            (state.channel.take(), state.connection.take())
        };

        for handle in handles {
            if let Some(channel) = &channel {
                let _ = channel
                    .basic_cancel(&handle.tag, BasicCancelOptions::default())
                    .await;
            }
            handle.task.abort();
        }

        if let Some(channel) = channel {
            let _ = channel.close(200, "shutdown").await;
        }
        if let Some(connection) = connection {
            let _ = connection.close(200, "shutdown").await;
        }

        info!("Broker connection closed");
    }

    /// Current connection status snapshot
    pub fn status(&self) -> BrokerStatus {
        BrokerStatus {
            connected: self.inner.connected.load(Ordering::SeqCst),
            reconnect_attempts: self.inner.reconnect_attempts.load(Ordering::SeqCst),
            consumers: self.inner.consumers.lock().keys().cloned().collect(),
        }
    }

    fn channel(&self) -> Option<Channel> {
        self.inner.state.read().channel.clone()
    }

    fn abort_consumers(&self) {
        let mut consumers = self.inner.consumers.lock();
        for (_, handle) in consumers.drain() {
            handle.task.abort();
        }
    }
}

/// Decode a delivery payload as JSON
fn decode_payload(data: &[u8]) -> serde_json::Result<serde_json::Value> {
    serde_json::from_slice(data)
}

/// Backoff delay for a reconnect attempt: `base * min(attempt, 5)`
fn reconnect_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms * u64::from(attempt.min(5)))
}

/// Next attempt number, or None once the cap is reached
fn next_reconnect_attempt(completed: u32, max: u32) -> Option<u32> {
    if completed >= max {
        None
    } else {
        Some(completed + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay_caps_at_five() {
        for attempt in 1..=10u32 {
            let expected = 5000 * u64::from(attempt.min(5));
            assert_eq!(
                reconnect_delay(5000, attempt),
                Duration::from_millis(expected),
                "attempt {}",
                attempt
            );
        }
        assert_eq!(reconnect_delay(5000, 1), Duration::from_millis(5000));
        assert_eq!(reconnect_delay(5000, 5), Duration::from_millis(25000));
        assert_eq!(reconnect_delay(5000, 9), Duration::from_millis(25000));
    }

    #[test]
    fn test_attempts_capped_at_max() {
        // attempts 1..=10 are scheduled; an 11th never is
        let mut completed = 0;
        let mut scheduled = Vec::new();
        while let Some(attempt) = next_reconnect_attempt(completed, 10) {
            scheduled.push(attempt);
            completed = attempt;
        }
        assert_eq!(scheduled, (1..=10).collect::<Vec<_>>());
        assert_eq!(next_reconnect_attempt(10, 10), None);
        assert_eq!(next_reconnect_attempt(11, 10), None);
    }

    #[test]
    fn test_attempt_counter_resets_allow_fresh_schedule() {
        // after a successful connect the counter resets to 0
        assert_eq!(next_reconnect_attempt(0, 10), Some(1));
    }

    #[test]
    fn test_decode_payload_valid_json() {
        let value = decode_payload(br#"{"title":"Build failed","type":"error"}"#).unwrap();
        assert_eq!(value["title"], "Build failed");
        assert_eq!(value["type"], "error");
    }

    #[test]
    fn test_decode_payload_rejects_garbage() {
        assert!(decode_payload(b"not json at all").is_err());
        assert!(decode_payload(b"").is_err());
        assert!(decode_payload(&[0xff, 0xfe]).is_err());
    }

    #[tokio::test]
    async fn test_status_before_connect() {
        let client = BrokerClient::new(BrokerConfig::default());
        let status = client.status();
        assert!(!status.connected);
        assert_eq!(status.reconnect_attempts, 0);
        assert!(status.consumers.is_empty());
    }

    #[tokio::test]
    async fn test_connect_without_url_is_noop() {
        let client = BrokerClient::new(BrokerConfig::default());
        assert!(!client.connect().await);
        assert!(!client.status().connected);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let client = BrokerClient::new(BrokerConfig::default());
        client.close().await;
        client.close().await;
        assert!(!client.status().connected);
    }

    #[tokio::test]
    async fn test_publish_without_channel_returns_false() {
        let client = BrokerClient::new(BrokerConfig::default());
        let sent = client
            .publish("github-webhooks", "webhook.github", &serde_json::json!({"title": "x"}))
            .await;
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_status_serializes_camel_case() {
        let client = BrokerClient::new(BrokerConfig::default());
        let value = serde_json::to_value(client.status()).unwrap();
        assert_eq!(value["connected"], false);
        assert_eq!(value["reconnectAttempts"], 0);
        assert!(value["consumers"].as_array().unwrap().is_empty());
    }
}
