//! In-memory notification repository
//!
//! Newest-first, capped at a configured maximum; oldest entries fall off
//! when the cap is exceeded.

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Notification, NotificationInput};

use super::NotificationRepository;

pub struct InMemoryNotificationRepository {
    notifications: RwLock<Vec<Notification>>,
    max_notifications: usize,
}

impl InMemoryNotificationRepository {
    pub fn new(max_notifications: usize) -> Self {
        Self {
            notifications: RwLock::new(Vec::new()),
            max_notifications,
        }
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn add(&self, input: NotificationInput) -> Result<Notification> {
        let notification = Notification::from_input(Uuid::new_v4().to_string(), input);

        let mut notifications = self.notifications.write();
        notifications.insert(0, notification.clone());
        notifications.truncate(self.max_notifications);

        Ok(notification)
    }

    async fn get_all(&self, limit: usize, unread_only: bool) -> Result<Vec<Notification>> {
        let notifications = self.notifications.read();
        Ok(notifications
            .iter()
            .filter(|n| !unread_only || !n.read)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Notification>> {
        let notifications = self.notifications.read();
        Ok(notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn mark_as_read(&self, id: &str) -> Result<Option<Notification>> {
        let mut notifications = self.notifications.write();
        match notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                Ok(Some(notification.clone()))
            }
            None => Ok(None),
        }
    }

    async fn mark_all_as_read(&self) -> Result<usize> {
        let mut notifications = self.notifications.write();
        for notification in notifications.iter_mut() {
            notification.read = true;
        }
        Ok(notifications.len())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut notifications = self.notifications.write();
        let before = notifications.len();
        notifications.retain(|n| n.id != id);
        Ok(notifications.len() < before)
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut notifications = self.notifications.write();
        let count = notifications.len();
        notifications.clear();
        Ok(count)
    }

    async fn unread_count(&self) -> Result<usize> {
        let notifications = self.notifications.read();
        Ok(notifications.iter().filter(|n| !n.read).count())
    }
}
