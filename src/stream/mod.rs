//! Live streaming module
//!
//! Fans notifications out to attached browser sessions over Server-Sent
//! Events. Each attached client owns a frame channel drained by its HTTP
//! response body; a write failure on one client never affects delivery to
//! the rest.
//!
//! Components:
//! - **broadcaster**: client registry, attach/detach, broadcast and unicast
//! - **frames**: SSE wire framing (`event:`/`data:` blocks, comment
//!   heartbeats)
//! - **metrics**: Prometheus gauges and counters for the client registry

pub mod broadcaster;
pub mod frames;
pub mod metrics;

pub use broadcaster::{StreamBroadcaster, StreamStats, StreamStatus};
pub use frames::StreamFrame;
