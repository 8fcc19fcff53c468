//! 持久化端口。两个可互换的后端在组装时显式选择：
//! 进程内内存实现（开发和测试）与 sqlx/Postgres 实现（生产）。

pub mod memory;
pub mod postgres;

use crate::{
    error::Result,
    models::{
        notification::Notification,
        post::{Comment, Post},
        user::User,
    },
};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type PostStream = BoxStream<'static, Result<Post>>;
pub type UserStream = BoxStream<'static, Result<User>>;

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// 按ID upsert：新ID插入，已有ID整体替换
    async fn save(&self, post: Post) -> Result<Post>;

    /// 返回完整评论树；软删除的帖子照常返回，由调用方决定语义
    async fn find_by_id(&self, id: &str) -> Result<Option<Post>>;

    fn find_all(&self) -> PostStream;

    fn find_by_author_id(&self, author_id: &str) -> PostStream;

    /// 仅返回 report_count > 0 且未删除的帖子
    fn find_reported(&self) -> PostStream;

    /// 帖子或指定的父评论不存在时返回 None。
    /// 存储前根据帖子作者设置 by_post_author。
    async fn add_comment(
        &self,
        post_id: &str,
        comment: Comment,
        parent_comment_id: Option<&str>,
    ) -> Result<Option<Comment>>;

    /// 仅在帖子存在且未删除时原子递增；已删除的帖子原样返回（不递增）
    async fn increment_view_count(&self, id: &str) -> Result<Option<Post>>;

    async fn delete_post(&self, id: &str) -> Result<bool>;

    async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<bool>;

    async fn report_post(&self, id: &str) -> Result<Option<Post>>;

    /// delete 为真时置 deleted；无论如何将 report_count 归零
    async fn moderate_post(&self, id: &str, delete: bool) -> Result<Option<Post>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save(&self, user: User) -> Result<User>;

    fn find_all(&self) -> UserStream;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn delete_by_id(&self, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn save(&self, notification: Notification) -> Result<Notification>;

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Notification>>;

    async fn mark_as_read(&self, notification_id: &str) -> Result<bool>;
}
