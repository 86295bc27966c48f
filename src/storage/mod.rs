//! Notification persistence
//!
//! The relay owns the persist-then-broadcast ordering but not durability:
//! the repository is a seam, and the in-memory implementation here is the
//! default for standalone deployments and tests. Writes must never be
//! silently dropped; failures propagate as errors.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Notification, NotificationInput};

pub use memory::InMemoryNotificationRepository;

/// Storage seam for notifications
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist a notification, returning it with the store-assigned id
    async fn add(&self, input: NotificationInput) -> Result<Notification>;

    /// Most recent notifications, optionally unread only
    async fn get_all(&self, limit: usize, unread_only: bool) -> Result<Vec<Notification>>;

    /// Look up a single notification
    async fn get_by_id(&self, id: &str) -> Result<Option<Notification>>;

    /// Mark one notification read; None when the id is unknown
    async fn mark_as_read(&self, id: &str) -> Result<Option<Notification>>;

    /// Mark everything read, returning the read count
    async fn mark_all_as_read(&self) -> Result<usize>;

    /// Delete one notification; false when the id is unknown
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Delete everything, returning the removed count
    async fn delete_all(&self) -> Result<usize>;

    /// Number of unread notifications
    async fn unread_count(&self) -> Result<usize>;
}
