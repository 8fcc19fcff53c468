//! 进程内内存后端。所有变更都在同一把写锁下完成，
//! 同一帖子上的并发评论/计数操作因此天然串行化。

use crate::{
    error::{AppError, Result},
    models::{
        notification::Notification,
        post::{Comment, Post},
        user::User,
    },
    repository::{NotificationRepository, PostRepository, PostStream, UserRepository, UserStream},
};
use async_trait::async_trait;
use futures::{stream, TryStreamExt};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: Arc<RwLock<Vec<Post>>>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot_stream<F>(&self, filter: F) -> PostStream
    where
        F: Fn(&Post) -> bool + Send + Sync + 'static,
    {
        let posts = self.posts.clone();
        // 惰性：首次 poll 时才做快照，每次调用可重新消费
        Box::pin(
            stream::once(async move {
                let snapshot: Vec<Post> = posts
                    .read()
                    .iter()
                    .filter(|p| filter(p))
                    .cloned()
                    .collect();
                Ok::<_, AppError>(stream::iter(snapshot.into_iter().map(Ok)))
            })
            .try_flatten(),
        )
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn save(&self, post: Post) -> Result<Post> {
        let mut posts = self.posts.write();
        match posts.iter_mut().find(|p| p.id == post.id) {
            Some(existing) => *existing = post.clone(),
            None => posts.push(post.clone()),
        }
        Ok(post)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Post>> {
        Ok(self.posts.read().iter().find(|p| p.id == id).cloned())
    }

    fn find_all(&self) -> PostStream {
        self.snapshot_stream(|_| true)
    }

    fn find_by_author_id(&self, author_id: &str) -> PostStream {
        let author_id = author_id.to_string();
        self.snapshot_stream(move |p| p.author_id == author_id)
    }

    fn find_reported(&self) -> PostStream {
        self.snapshot_stream(|p| p.report_count > 0 && !p.deleted)
    }

    async fn add_comment(
        &self,
        post_id: &str,
        mut comment: Comment,
        parent_comment_id: Option<&str>,
    ) -> Result<Option<Comment>> {
        let mut posts = self.posts.write();
        let post = match posts.iter_mut().find(|p| p.id == post_id) {
            Some(post) => post,
            None => return Ok(None),
        };

        comment.by_post_author = comment.author_id == post.author_id;

        match parent_comment_id {
            None => {
                post.comments.push(comment.clone());
                Ok(Some(comment))
            }
            Some(parent_id) => {
                match post.comments.iter_mut().find(|c| c.id == parent_id) {
                    Some(parent) => {
                        parent.replies.push(comment.clone());
                        Ok(Some(comment))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    async fn increment_view_count(&self, id: &str) -> Result<Option<Post>> {
        let mut posts = self.posts.write();
        let post = match posts.iter_mut().find(|p| p.id == id) {
            Some(post) => post,
            None => return Ok(None),
        };
        if !post.deleted {
            post.view_count += 1;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: &str) -> Result<bool> {
        let mut posts = self.posts.write();
        match posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<bool> {
        let mut posts = self.posts.write();
        let post = match posts.iter_mut().find(|p| p.id == post_id) {
            Some(post) => post,
            None => return Ok(false),
        };

        let target = match parent_comment_id {
            None => post.comments.iter_mut().find(|c| c.id == comment_id),
            Some(parent_id) => post
                .comments
                .iter_mut()
                .find(|c| c.id == parent_id)
                .and_then(|parent| parent.replies.iter_mut().find(|r| r.id == comment_id)),
        };

        match target {
            Some(comment) => {
                comment.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn report_post(&self, id: &str) -> Result<Option<Post>> {
        let mut posts = self.posts.write();
        match posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.report_count += 1;
                Ok(Some(post.clone()))
            }
            None => Ok(None),
        }
    }

    async fn moderate_post(&self, id: &str, delete: bool) -> Result<Option<Post>> {
        let mut posts = self.posts.write();
        match posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                if delete {
                    post.deleted = true;
                }
                post.report_count = 0;
                Ok(Some(post.clone()))
            }
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<Vec<User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save(&self, user: User) -> Result<User> {
        let mut users = self.users.write();
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => users.push(user.clone()),
        }
        Ok(user)
    }

    fn find_all(&self) -> UserStream {
        let users = self.users.clone();
        Box::pin(
            stream::once(async move {
                let snapshot: Vec<User> = users.read().clone();
                Ok::<_, AppError>(stream::iter(snapshot.into_iter().map(Ok)))
            })
            .try_flatten(),
        )
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.read().iter().find(|u| u.email == email).cloned())
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn save(&self, notification: Notification) -> Result<Notification> {
        self.notifications.write().push(notification.clone());
        Ok(notification)
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Notification>> {
        Ok(self
            .notifications
            .read()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_as_read(&self, notification_id: &str) -> Result<bool> {
        let mut notifications = self.notifications.write();
        match notifications.iter_mut().find(|n| n.id == notification_id) {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn sample_post(author: &str) -> Post {
        Post::new(
            "hello".to_string(),
            Vec::new(),
            None,
            author.to_string(),
            format!("anon-{}", author),
        )
    }

    #[test]
    fn save_is_upsert_by_id() {
        tokio_test::block_on(async {
            let repo = InMemoryPostRepository::new();
            let mut post = repo.save(sample_post("u1")).await.unwrap();
            post.text = "edited".to_string();
            repo.save(post.clone()).await.unwrap();

            let found = repo.find_by_id(&post.id).await.unwrap().unwrap();
            assert_eq!(found.text, "edited");

            let all: Vec<Post> = repo.find_all().try_collect().await.unwrap();
            assert_eq!(all.len(), 1);
        });
    }

    #[test]
    fn increment_skips_deleted_posts() {
        tokio_test::block_on(async {
            let repo = InMemoryPostRepository::new();
            let post = repo.save(sample_post("u1")).await.unwrap();

            let viewed = repo.increment_view_count(&post.id).await.unwrap().unwrap();
            assert_eq!(viewed.view_count, 1);

            repo.delete_post(&post.id).await.unwrap();
            let after = repo.increment_view_count(&post.id).await.unwrap().unwrap();
            assert_eq!(after.view_count, 1);
            assert!(after.deleted);

            assert!(repo.increment_view_count("missing").await.unwrap().is_none());
        });
    }

    #[test]
    fn add_comment_requires_existing_parent() {
        tokio_test::block_on(async {
            let repo = InMemoryPostRepository::new();
            let post = repo.save(sample_post("u1")).await.unwrap();

            let comment = Comment::new(
                post.id.clone(),
                "u2".to_string(),
                "anon-u2".to_string(),
                "hi".to_string(),
                Vec::new(),
                None,
            );
            let saved = repo.add_comment(&post.id, comment, None).await.unwrap();
            assert!(saved.is_some());

            let orphan = Comment::new(
                post.id.clone(),
                "u3".to_string(),
                "anon-u3".to_string(),
                "reply".to_string(),
                Vec::new(),
                Some("missing".to_string()),
            );
            let saved = repo.add_comment(&post.id, orphan, Some("missing")).await.unwrap();
            assert!(saved.is_none());
        });
    }

    #[test]
    fn reported_stream_excludes_deleted() {
        tokio_test::block_on(async {
            let repo = InMemoryPostRepository::new();
            let reported = repo.save(sample_post("u1")).await.unwrap();
            let deleted = repo.save(sample_post("u2")).await.unwrap();
            repo.save(sample_post("u3")).await.unwrap();

            repo.report_post(&reported.id).await.unwrap();
            repo.report_post(&deleted.id).await.unwrap();
            repo.delete_post(&deleted.id).await.unwrap();

            let posts: Vec<Post> = repo.find_reported().try_collect().await.unwrap();
            assert_eq!(posts.len(), 1);
            assert_eq!(posts[0].id, reported.id);

            // 流可以重新开始消费
            let again: Vec<Post> = repo.find_reported().try_collect().await.unwrap();
            assert_eq!(again.len(), 1);
        });
    }
}
