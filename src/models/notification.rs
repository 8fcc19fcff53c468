use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    /// 接收通知的用户
    pub user_id: String,
    pub source_post_id: String,
    /// 顶层评论触发时为空，回复触发时为父评论ID
    pub source_comment_id: Option<String>,
    pub triggering_anonymous_id: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: String,
        source_post_id: String,
        source_comment_id: Option<String>,
        triggering_anonymous_id: String,
        message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            source_post_id,
            source_comment_id,
            triggering_anonymous_id,
            message,
            read: false,
            created_at: Utc::now(),
        }
    }
}
