use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{sse::Event, IntoResponse, Sse},
    Json,
};
use prometheus::Encoder;
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};
use tracing::debug;

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::Notification;
use crate::service::ServiceStatus;
use crate::stream::StreamBroadcaster;

/// Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Merged broker and stream status
pub async fn relay_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(state.service.status())
}

/// Prometheus metrics in text exposition format
pub async fn metrics() -> Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metrics = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metrics, &mut buffer)
        .map_err(|e| AppError::Internal(format!("failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| AppError::Internal(format!("metrics output not utf-8: {}", e)))
}

/// Detaches the client when the response stream is dropped, which is the
/// only disconnect signal an SSE server gets.
struct DetachGuard {
    broadcaster: Arc<StreamBroadcaster>,
    client_id: String,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        self.broadcaster.detach(&self.client_id);
    }
}

/// Live notification stream over Server-Sent Events
pub async fn notification_stream(State(state): State<AppState>) -> impl IntoResponse {
    let (client_id, rx) = state.broadcaster.attach();
    debug!(client_id = %client_id, "Stream client attached");

    let guard = DetachGuard {
        broadcaster: Arc::clone(&state.broadcaster),
        client_id,
    };

    // The guard lives inside the stream so disconnecting the response drops
    // it and detaches the client.
    let stream = UnboundedReceiverStream::new(rx).map(move |frame| {
        let _ = &guard;
        Ok::<Event, Infallible>(frame.into_sse_event())
    });

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub unread: bool,
}

/// List stored notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<NotificationListResponse>> {
    let limit = params.limit.unwrap_or(50);
    let notifications = state.repository.get_all(limit, params.unread).await?;
    let unread_count = state.repository.unread_count().await?;

    Ok(Json(NotificationListResponse {
        total: notifications.len(),
        unread_count,
        notifications,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub total: usize,
    pub unread_count: usize,
    pub notifications: Vec<Notification>,
}

/// Fetch a single stored notification
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    state
        .repository
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("notification {} not found", id)))
}

/// Mark one notification read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    state
        .repository
        .mark_as_read(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("notification {} not found", id)))
}

/// Mark every stored notification read
pub async fn mark_all_read(State(state): State<AppState>) -> Result<Json<CountResponse>> {
    let count = state.repository.mark_all_as_read().await?;
    Ok(Json(CountResponse { count }))
}

/// Delete one notification
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if state.repository.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("notification {} not found", id)))
    }
}

/// Delete every stored notification
pub async fn delete_all_notifications(
    State(state): State<AppState>,
) -> Result<Json<CountResponse>> {
    let count = state.repository.delete_all().await?;
    Ok(Json(CountResponse { count }))
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}
