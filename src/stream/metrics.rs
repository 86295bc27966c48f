//! Prometheus metrics for stream fan-out

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

/// Stream metrics
pub struct StreamMetrics {
    /// Currently attached clients
    pub active_clients: IntGauge,

    /// Clients attached over the process lifetime
    pub clients_attached: IntCounter,

    /// Broadcast passes performed
    pub broadcasts: IntCounter,

    /// Individual client deliveries that succeeded
    pub deliveries: IntCounter,

    /// Individual client writes that failed (client detached afterwards)
    pub write_failures: IntCounter,
}

lazy_static! {
    pub static ref STREAM_METRICS: StreamMetrics = StreamMetrics {
        active_clients: register_int_gauge!(
            "stream_active_clients",
            "Number of currently attached stream clients"
        )
        .unwrap(),

        clients_attached: register_int_counter!(
            "stream_clients_attached_total",
            "Total stream clients attached"
        )
        .unwrap(),

        broadcasts: register_int_counter!(
            "stream_broadcasts_total",
            "Total broadcast passes performed"
        )
        .unwrap(),

        deliveries: register_int_counter!(
            "stream_deliveries_total",
            "Total successful per-client notification writes"
        )
        .unwrap(),

        write_failures: register_int_counter!(
            "stream_write_failures_total",
            "Total failed per-client writes"
        )
        .unwrap(),
    };
}
