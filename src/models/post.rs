use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentType {
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub gender: Option<String>,
    /// 真实用户ID，绝不序列化给客户端
    #[serde(skip_serializing)]
    pub author_id: String,
    /// 对外展示的匿名ID
    pub anonymous_id: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub view_count: i64,
    pub deleted: bool,
    pub report_count: i64,
    /// 请求者相关的派生字段，读取时计算，不持久化
    #[serde(default)]
    pub can_delete: bool,
}

impl Post {
    pub fn new(
        text: String,
        attachments: Vec<Attachment>,
        gender: Option<String>,
        author_id: String,
        anonymous_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            attachments,
            gender,
            author_id,
            anonymous_id,
            comments: Vec::new(),
            view_count: 0,
            deleted: false,
            report_count: 0,
            can_delete: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    #[serde(skip_serializing)]
    pub author_id: String,
    pub anonymous_id: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub parent_comment_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<Comment>,
    /// 创建时一次性计算：是否由帖子作者本人发表
    pub by_post_author: bool,
    pub deleted: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl Comment {
    pub fn new(
        post_id: String,
        author_id: String,
        anonymous_id: String,
        text: String,
        attachments: Vec<Attachment>,
        parent_comment_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post_id,
            author_id,
            anonymous_id,
            text,
            attachments,
            parent_comment_id,
            replies: Vec::new(),
            by_post_author: false,
            deleted: false,
            can_delete: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 10000))]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 10000))]
    pub text: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 5000))]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub parent_comment_id: Option<String>,
}
