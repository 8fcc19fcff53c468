use crate::{error::Result, models::notification::Notification, repository::NotificationRepository};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(notifications: Arc<dyn NotificationRepository>) -> Self {
        Self { notifications }
    }

    pub async fn get_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        info!("Getting notifications for user {}", user_id);
        self.notifications.find_by_user_id(user_id).await
    }

    pub async fn mark_as_read(&self, notification_id: &str) -> Result<bool> {
        info!("Marking notification {} as read", notification_id);
        self.notifications.mark_as_read(notification_id).await
    }
}
