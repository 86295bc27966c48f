use notify_relay::{
    api::{build_router, AppState},
    broker::BrokerClient,
    config::Config,
    service::NotificationService,
    storage::InMemoryNotificationRepository,
    stream::StreamBroadcaster,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.observability.log_level.clone().into());
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting notify-relay v{}", env!("CARGO_PKG_VERSION"));

    // Wire up components
    let repository = Arc::new(InMemoryNotificationRepository::new(
        config.storage.max_notifications,
    ));
    let broadcaster = Arc::new(StreamBroadcaster::new(&config.stream));
    let broker = BrokerClient::new(config.broker.clone());

    let service = Arc::new(NotificationService::new(
        &config.broker,
        broker,
        broadcaster.clone(),
        repository.clone(),
    ));

    // The lifecycle listener is registered before this first attempt, so a
    // failed attempt here still leaves reconnects consuming once the broker
    // comes back.
    if service.initialize().await {
        tracing::info!("Broker connected");
    } else {
        tracing::warn!("Broker unavailable at startup - will keep retrying in the background");
    }

    let app_state = AppState::new(service.clone(), broadcaster, repository)
        .with_prometheus(config.observability.prometheus_enabled);
    let app = build_router(app_state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Notification stream: http://{}/api/notifications/stream", http_addr);
    tracing::info!("   Stored notifications: http://{}/api/notifications", http_addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    service.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
