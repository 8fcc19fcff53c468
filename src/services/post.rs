use crate::{
    error::{AppError, Result},
    models::{
        notification::Notification,
        post::{Comment, CommentRequest, CreatePostRequest, Post, UpdatePostRequest},
    },
    repository::{NotificationRepository, PostRepository, UserRepository},
    services::authorization,
};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

const REPLY_NOTIFICATION_MESSAGE: &str = "A new reply was added to your post/comment.";

/// 帖子与评论的主业务逻辑：校验作者身份、处理举报和删除标记，
/// 让路由层保持轻薄。
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            posts,
            users,
            notifications,
        }
    }

    /// 以某个用户的身份发帖。
    ///
    /// `author_id` 是真实用户ID，`anonymous_id` 来自令牌，
    /// 是唯一对外可见的作者标识。
    pub async fn create_post(
        &self,
        request: CreatePostRequest,
        author_id: &str,
        anonymous_id: &str,
    ) -> Result<Post> {
        info!("Creating post for user {}", author_id);
        request.validate().map_err(AppError::ValidatorError)?;

        if self.is_suspended(author_id).await? {
            warn!("User {} is suspended, cannot create post", author_id);
            return Err(AppError::Suspended);
        }

        let post = Post::new(
            request.text,
            request.attachments,
            request.gender,
            author_id.to_string(),
            anonymous_id.to_string(),
        );
        self.posts.save(post).await
    }

    pub async fn get_posts(
        &self,
        offset: usize,
        limit: Option<usize>,
        requester_id: Option<&str>,
    ) -> Result<Vec<Post>> {
        info!("Getting posts with offset {}, limit {:?}", offset, limit);
        let stream = self.posts.find_all().skip(offset);
        let posts: Vec<Post> = match limit {
            Some(limit) => stream.take(limit).try_collect().await?,
            None => stream.try_collect().await?,
        };
        Ok(project_posts(posts, requester_id))
    }

    pub async fn get_posts_by_user(
        &self,
        user_id: &str,
        requester_id: Option<&str>,
    ) -> Result<Vec<Post>> {
        info!("Getting posts for user {}", user_id);
        let posts: Vec<Post> = self.posts.find_by_author_id(user_id).try_collect().await?;
        Ok(project_posts(posts, requester_id))
    }

    pub async fn get_reported_posts(&self, requester_id: Option<&str>) -> Result<Vec<Post>> {
        info!("Getting reported posts");
        let posts: Vec<Post> = self.posts.find_reported().try_collect().await?;
        Ok(project_posts(posts, requester_id))
    }

    /// 读取单个帖子并计一次浏览；已删除的帖子原样返回、不计数，
    /// 由调用方决定对外如何呈现。
    pub async fn get_post(&self, id: &str, requester_id: Option<&str>) -> Result<Option<Post>> {
        info!("Getting post {}", id);
        let post = self.posts.increment_view_count(id).await?;
        Ok(post.map(|p| project_post(p, requester_id)))
    }

    /// 编辑只允许作者本人；找不到帖子或无权限都返回 None
    pub async fn update_post(
        &self,
        id: &str,
        request: UpdatePostRequest,
        requester_id: &str,
    ) -> Result<Option<Post>> {
        info!("Updating post {} by user {}", id, requester_id);
        request.validate().map_err(AppError::ValidatorError)?;

        let existing = match self.posts.find_by_id(id).await? {
            Some(post) => post,
            None => return Ok(None),
        };

        if !authorization::can_edit(requester_id, &existing.author_id) {
            warn!("User {} is not authorized to update post {}", requester_id, id);
            return Ok(None);
        }

        let mut updated = existing;
        if let Some(text) = request.text {
            updated.text = text;
        }
        if let Some(attachments) = request.attachments {
            updated.attachments = attachments;
        }
        if let Some(gender) = request.gender {
            updated.gender = Some(gender);
        }
        Ok(Some(self.posts.save(updated).await?))
    }

    /// 评论或回复。成功入库后确定通知对象：顶层评论通知帖子作者，
    /// 回复通知父评论作者；自己评论自己不通知。
    /// 通知是尽力而为的副作用，失败只记日志，绝不影响评论结果。
    pub async fn add_comment(
        &self,
        post_id: &str,
        request: CommentRequest,
        author_id: &str,
        anonymous_id: &str,
    ) -> Result<Option<Comment>> {
        info!("Adding comment to post {} by user {}", post_id, author_id);
        request.validate().map_err(AppError::ValidatorError)?;

        if self.is_suspended(author_id).await? {
            warn!("User {} is suspended, cannot add comment", author_id);
            return Err(AppError::Suspended);
        }

        let post = match self.posts.find_by_id(post_id).await? {
            Some(post) => post,
            None => return Ok(None),
        };

        let parent_comment_id = request.parent_comment_id.clone();
        let comment = Comment::new(
            post_id.to_string(),
            author_id.to_string(),
            anonymous_id.to_string(),
            request.text,
            request.attachments,
            parent_comment_id.clone(),
        );

        let saved = self
            .posts
            .add_comment(post_id, comment, parent_comment_id.as_deref())
            .await?;

        if let Some(saved) = &saved {
            let target_user_id = match &parent_comment_id {
                None => Some(post.author_id.clone()),
                Some(parent_id) => post
                    .comments
                    .iter()
                    .find(|c| &c.id == parent_id)
                    .map(|c| c.author_id.clone()),
            };

            if let Some(target) = target_user_id {
                if target != author_id {
                    let notification = Notification::new(
                        target,
                        post_id.to_string(),
                        parent_comment_id,
                        anonymous_id.to_string(),
                        REPLY_NOTIFICATION_MESSAGE.to_string(),
                    );
                    if let Err(e) = self.notifications.save(notification).await {
                        warn!("Failed to save reply notification for comment {}: {}", saved.id, e);
                    }
                }
            }
        }

        Ok(saved)
    }

    pub async fn delete_post(&self, id: &str, requester_id: &str, admin: bool) -> Result<bool> {
        info!("Deleting post {} by user {} (admin: {})", id, requester_id, admin);
        let post = match self.posts.find_by_id(id).await? {
            Some(post) => post,
            None => return Ok(false),
        };
        if !authorization::can_delete(requester_id, &post.author_id, admin) {
            warn!("User {} is not authorized to delete post {}", requester_id, id);
            return Ok(false);
        }
        self.posts.delete_post(id).await
    }

    pub async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        requester_id: &str,
        admin: bool,
        parent_comment_id: Option<&str>,
    ) -> Result<bool> {
        info!(
            "Deleting comment {} from post {} by user {} (admin: {})",
            comment_id, post_id, requester_id, admin
        );
        let post = match self.posts.find_by_id(post_id).await? {
            Some(post) => post,
            None => return Ok(false),
        };
        let target_author = find_comment_author(&post, comment_id, parent_comment_id);
        let authorized = match target_author {
            Some(owner) => authorization::can_delete(requester_id, &owner, admin),
            None => false,
        };
        if !authorized {
            warn!("User {} is not authorized to delete comment {}", requester_id, comment_id);
            return Ok(false);
        }
        self.posts
            .delete_comment(post_id, comment_id, parent_comment_id)
            .await
    }

    /// 举报不做所有权检查，任何已认证用户都可以举报
    pub async fn report_post(&self, id: &str) -> Result<Option<Post>> {
        info!("Reporting post {}", id);
        self.posts.report_post(id).await
    }

    pub async fn moderate_post(
        &self,
        id: &str,
        delete: bool,
        moderator: bool,
    ) -> Result<Option<Post>> {
        info!("Moderating post {} (delete: {})", id, delete);
        if !authorization::can_moderate(moderator) {
            warn!("Caller is not a moderator, cannot moderate post {}", id);
            return Ok(None);
        }
        self.posts.moderate_post(id, delete).await
    }

    /// 停权检查：suspended_until 严格晚于当前时间才算停权中。
    /// 只拦创建操作，对读取、删除、举报处理无效。
    async fn is_suspended(&self, user_id: &str) -> Result<bool> {
        let user = match self.users.find_by_id(user_id).await? {
            Some(user) => user,
            None => return Ok(false),
        };
        match user.suspended_until {
            Some(until) => Ok(Utc::now() < until),
            None => Ok(false),
        }
    }
}

fn find_comment_author(
    post: &Post,
    comment_id: &str,
    parent_comment_id: Option<&str>,
) -> Option<String> {
    match parent_comment_id {
        None => post
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .map(|c| c.author_id.clone()),
        Some(parent_id) => post
            .comments
            .iter()
            .find(|c| c.id == parent_id)?
            .replies
            .iter()
            .find(|r| r.id == comment_id)
            .map(|r| r.author_id.clone()),
    }
}

/// 视角投影：在调用方持有的副本上标注 can_delete，
/// 每次请求按请求者重算，绝不落库。匿名读取保持默认 false。
fn project_post(mut post: Post, requester_id: Option<&str>) -> Post {
    if let Some(requester_id) = requester_id {
        post.can_delete = post.author_id == requester_id;
        for comment in &mut post.comments {
            project_comment(comment, requester_id);
        }
    }
    post
}

fn project_comment(comment: &mut Comment, requester_id: &str) {
    comment.can_delete = comment.author_id == requester_id;
    for reply in &mut comment.replies {
        project_comment(reply, requester_id);
    }
}

fn project_posts(posts: Vec<Post>, requester_id: Option<&str>) -> Vec<Post> {
    debug!("Projecting {} posts for requester {:?}", posts.len(), requester_id);
    posts
        .into_iter()
        .map(|p| project_post(p, requester_id))
        .collect()
}
