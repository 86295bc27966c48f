pub mod handlers;
pub mod routes;

pub use routes::*;

use std::sync::Arc;

use crate::service::NotificationService;
use crate::storage::NotificationRepository;
use crate::stream::StreamBroadcaster;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NotificationService>,
    pub broadcaster: Arc<StreamBroadcaster>,
    pub repository: Arc<dyn NotificationRepository>,
    pub prometheus_enabled: bool,
}

impl AppState {
    pub fn new(
        service: Arc<NotificationService>,
        broadcaster: Arc<StreamBroadcaster>,
        repository: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            service,
            broadcaster,
            repository,
            prometheus_enabled: false,
        }
    }

    pub fn with_prometheus(mut self, enabled: bool) -> Self {
        self.prometheus_enabled = enabled;
        self
    }
}
