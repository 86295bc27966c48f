//! Stream client registry and fan-out
//!
//! The registry maps client ids to frame senders. A client's receiver is
//! drained by its SSE response body; when the body is dropped (client
//! disconnect) the sender fails and the client is removed. Broadcast
//! iterates a snapshot of ids so removals never race the pass, and a write
//! failure on one client is isolated from the rest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::models::Notification;

use super::frames::StreamFrame;
use super::metrics::STREAM_METRICS;

/// Stream status snapshot (diagnostic)
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub connected_clients: usize,
    pub client_ids: Vec<String>,
}

/// Cumulative stream statistics
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub total_clients: u64,
    pub active_clients: u64,
    pub total_broadcasts: u64,
    pub total_delivered: u64,
}

struct StreamClient {
    tx: mpsc::UnboundedSender<StreamFrame>,
    heartbeat: JoinHandle<()>,
}

/// Fan-out registry for attached streaming clients
pub struct StreamBroadcaster {
    clients: DashMap<String, StreamClient>,
    counter: AtomicU64,
    heartbeat_interval: Duration,
    stats: RwLock<StreamStats>,
}

impl StreamBroadcaster {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            clients: DashMap::new(),
            counter: AtomicU64::new(0),
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
            stats: RwLock::new(StreamStats::default()),
        }
    }

    /// Register a new client. Returns its id and the frame receiver the
    /// transport must drain; the first frame is always the `connected`
    /// event. The caller is responsible for calling `detach` when the
    /// transport closes.
    pub fn attach(&self) -> (String, mpsc::UnboundedReceiver<StreamFrame>) {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let client_id = format!("client_{}_{}", seq, Utc::now().timestamp_millis());

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(StreamFrame::connected(&client_id));

        let heartbeat = self.spawn_heartbeat(tx.clone());
        self.clients
            .insert(client_id.clone(), StreamClient { tx, heartbeat });

        {
            let mut stats = self.stats.write();
            stats.total_clients += 1;
            stats.active_clients = self.clients.len() as u64;
        }
        STREAM_METRICS.clients_attached.inc();
        STREAM_METRICS.active_clients.set(self.clients.len() as i64);

        info!(client_id = %client_id, total = self.clients.len(), "Stream client attached");
        (client_id, rx)
    }

    fn spawn_heartbeat(&self, tx: mpsc::UnboundedSender<StreamFrame>) -> JoinHandle<()> {
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately; the connected frame
            // already went out, so skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(StreamFrame::heartbeat()).is_err() {
                    break;
                }
            }
        })
    }

    /// Remove a client. Safe to call repeatedly; later calls are no-ops.
    pub fn detach(&self, client_id: &str) {
        if let Some((_, client)) = self.clients.remove(client_id) {
            client.heartbeat.abort();

            let mut stats = self.stats.write();
            stats.active_clients = self.clients.len() as u64;
            drop(stats);
            STREAM_METRICS.active_clients.set(self.clients.len() as i64);

            info!(client_id = %client_id, total = self.clients.len(), "Stream client detached");
        }
    }

    /// Deliver a notification to every attached client. Failed clients are
    /// detached after the pass; returns the number of successful writes.
    /// An empty registry is an explicit no-op: no buffering, no backlog.
    pub fn broadcast(&self, notification: &Notification) -> usize {
        if self.clients.is_empty() {
            debug!("No stream clients attached, skipping broadcast");
            return 0;
        }

        let data = match serde_json::to_value(notification) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Failed to encode notification for broadcast");
                return 0;
            }
        };

        let snapshot: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
        let mut sent = 0;
        let mut failed = Vec::new();

        for client_id in snapshot {
            let Some(entry) = self.clients.get(&client_id) else {
                continue;
            };
            if entry
                .value()
                .tx
                .send(StreamFrame::notification(data.clone()))
                .is_ok()
            {
                sent += 1;
            } else {
                failed.push(client_id.clone());
            }
        }

        for client_id in &failed {
            warn!(client_id = %client_id, "Dropping stream client after failed write");
            STREAM_METRICS.write_failures.inc();
            self.detach(client_id);
        }

        {
            let mut stats = self.stats.write();
            stats.total_broadcasts += 1;
            stats.total_delivered += sent as u64;
        }
        STREAM_METRICS.broadcasts.inc();
        STREAM_METRICS.deliveries.inc_by(sent as u64);

        debug!(
            sent,
            failed = failed.len(),
            title = %notification.title,
            "Notification broadcast complete"
        );
        sent
    }

    /// Deliver a notification to one client; detaches it on write failure.
    pub fn send_to(&self, client_id: &str, notification: &Notification) -> bool {
        let Some(entry) = self.clients.get(client_id) else {
            warn!(client_id = %client_id, "Stream client not found");
            return false;
        };

        let delivered = entry.value().tx.send(StreamFrame::from(notification)).is_ok();
        drop(entry);

        if !delivered {
            warn!(client_id = %client_id, "Dropping stream client after failed write");
            STREAM_METRICS.write_failures.inc();
            self.detach(client_id);
        }
        delivered
    }

    /// Diagnostic snapshot of the registry
    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            connected_clients: self.clients.len(),
            client_ids: self.clients.iter().map(|e| e.key().clone()).collect(),
        }
    }

    /// Number of currently attached clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Cumulative statistics
    pub fn stats(&self) -> StreamStats {
        self.stats.read().clone()
    }

    /// Drop every client and stop their heartbeats. Used at shutdown;
    /// transport errors during teardown are irrelevant and ignored.
    pub fn teardown_all(&self) {
        let ids: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
        for client_id in ids {
            if let Some((_, client)) = self.clients.remove(&client_id) {
                client.heartbeat.abort();
            }
        }
        self.stats.write().active_clients = 0;
        STREAM_METRICS.active_clients.set(0);
        info!("All stream clients closed");
    }
}
