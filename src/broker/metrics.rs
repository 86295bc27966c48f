//! Prometheus metrics for broker operations

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

/// Broker metrics
pub struct BrokerMetrics {
    /// Messages successfully decoded and handed to the handler
    pub messages_consumed: IntCounterVec,

    /// Messages rejected without requeue because the payload failed decoding
    pub decode_rejections: IntCounterVec,

    /// Handler invocations that returned an error (message acked regardless)
    pub handler_failures: IntCounterVec,

    /// Reconnect attempts scheduled
    pub reconnects_scheduled: IntCounter,

    /// Current connection state (1 connected, 0 disconnected)
    pub connection_up: IntGauge,
}

lazy_static! {
    pub static ref BROKER_METRICS: BrokerMetrics = BrokerMetrics {
        messages_consumed: register_int_counter_vec!(
            "broker_messages_consumed_total",
            "Total messages decoded and delivered to the handler",
            &["queue"]
        )
        .unwrap(),

        decode_rejections: register_int_counter_vec!(
            "broker_decode_rejections_total",
            "Total messages rejected without requeue due to decode failure",
            &["queue"]
        )
        .unwrap(),

        handler_failures: register_int_counter_vec!(
            "broker_handler_failures_total",
            "Total handler invocations that returned an error",
            &["queue"]
        )
        .unwrap(),

        reconnects_scheduled: register_int_counter!(
            "broker_reconnects_scheduled_total",
            "Total broker reconnect attempts scheduled"
        )
        .unwrap(),

        connection_up: register_int_gauge!(
            "broker_connection_up",
            "Whether the broker connection is currently established"
        )
        .unwrap(),
    };
}
