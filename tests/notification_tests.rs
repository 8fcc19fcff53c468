use async_trait::async_trait;
use std::sync::Arc;
use whisper_board::{
    error::{AppError, Result},
    models::{notification::Notification, post::CommentRequest, post::CreatePostRequest},
    repository::{
        memory::{
            InMemoryNotificationRepository, InMemoryPostRepository, InMemoryUserRepository,
        },
        NotificationRepository, PostRepository,
    },
    services::{NotificationService, PostService},
};

fn setup() -> (PostService, Arc<InMemoryNotificationRepository>) {
    let posts = Arc::new(InMemoryPostRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());
    let notifications = Arc::new(InMemoryNotificationRepository::new());
    let service = PostService::new(posts, users, notifications.clone());
    (service, notifications)
}

fn text_post(text: &str) -> CreatePostRequest {
    CreatePostRequest {
        text: text.to_string(),
        attachments: Vec::new(),
        gender: None,
    }
}

fn comment(text: &str, parent_id: Option<&str>) -> CommentRequest {
    CommentRequest {
        text: text.to_string(),
        attachments: Vec::new(),
        parent_comment_id: parent_id.map(str::to_string),
    }
}

#[tokio::test]
async fn comment_notifies_post_author() {
    let (service, notifications) = setup();
    let post = service.create_post(text_post("Post by A"), "user-a", "anon-a").await.unwrap();

    service
        .add_comment(&post.id, comment("Comment by B", None), "user-b", "anon-b")
        .await
        .unwrap()
        .unwrap();

    let received = notifications.find_by_user_id("user-a").await.unwrap();
    assert_eq!(received.len(), 1);
    let notification = &received[0];
    assert_eq!(notification.user_id, "user-a");
    assert_eq!(notification.source_post_id, post.id);
    assert_eq!(notification.source_comment_id, None);
    assert_eq!(notification.triggering_anonymous_id, "anon-b");
    assert!(!notification.read);
}

#[tokio::test]
async fn reply_notifies_parent_comment_author() {
    let (service, notifications) = setup();
    let post = service.create_post(text_post("Post by A"), "user-a", "anon-a").await.unwrap();
    let parent = service
        .add_comment(&post.id, comment("Comment by B", None), "user-b", "anon-b")
        .await
        .unwrap()
        .unwrap();

    service
        .add_comment(&post.id, comment("Reply by C", Some(&parent.id)), "user-c", "anon-c")
        .await
        .unwrap()
        .unwrap();

    let received = notifications.find_by_user_id("user-b").await.unwrap();
    assert_eq!(received.len(), 1);
    let notification = &received[0];
    assert_eq!(notification.user_id, "user-b");
    assert_eq!(notification.source_post_id, post.id);
    assert_eq!(notification.source_comment_id.as_deref(), Some(parent.id.as_str()));
    assert_eq!(notification.triggering_anonymous_id, "anon-c");
}

#[tokio::test]
async fn self_comments_do_not_notify() {
    let (service, notifications) = setup();
    let post = service.create_post(text_post("Post by A"), "user-a", "anon-a").await.unwrap();

    service
        .add_comment(&post.id, comment("Comment by A", None), "user-a", "anon-a")
        .await
        .unwrap()
        .unwrap();

    let received = notifications.find_by_user_id("user-a").await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn self_replies_do_not_notify() {
    let (service, notifications) = setup();
    let post = service.create_post(text_post("Post by A"), "user-a", "anon-a").await.unwrap();
    let parent = service
        .add_comment(&post.id, comment("Comment by B", None), "user-b", "anon-b")
        .await
        .unwrap()
        .unwrap();

    service
        .add_comment(&post.id, comment("Reply by B", Some(&parent.id)), "user-b", "anon-b")
        .await
        .unwrap()
        .unwrap();

    let received = notifications.find_by_user_id("user-b").await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn mark_notification_as_read() {
    let (service, notifications) = setup();
    let post = service.create_post(text_post("Post by A"), "user-a", "anon-a").await.unwrap();
    service
        .add_comment(&post.id, comment("Comment by B", None), "user-b", "anon-b")
        .await
        .unwrap()
        .unwrap();

    let notification_service = NotificationService::new(notifications.clone());
    let received = notification_service.get_notifications("user-a").await.unwrap();
    assert_eq!(received.len(), 1);

    assert!(notification_service.mark_as_read(&received[0].id).await.unwrap());
    let received = notification_service.get_notifications("user-a").await.unwrap();
    assert!(received[0].read);

    assert!(!notification_service.mark_as_read("missing").await.unwrap());
}

/// 保存通知失败的仓储，用来验证通知只是尽力而为的副作用
struct FailingNotificationRepository;

#[async_trait]
impl NotificationRepository for FailingNotificationRepository {
    async fn save(&self, _notification: Notification) -> Result<Notification> {
        Err(AppError::internal("notification store is down"))
    }

    async fn find_by_user_id(&self, _user_id: &str) -> Result<Vec<Notification>> {
        Ok(Vec::new())
    }

    async fn mark_as_read(&self, _notification_id: &str) -> Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn notification_failure_does_not_fail_comment_creation() {
    let posts = Arc::new(InMemoryPostRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());
    let service = PostService::new(posts.clone(), users, Arc::new(FailingNotificationRepository));

    let post = service.create_post(text_post("Post by A"), "user-a", "anon-a").await.unwrap();
    let saved = service
        .add_comment(&post.id, comment("Comment by B", None), "user-b", "anon-b")
        .await
        .unwrap();

    assert!(saved.is_some());
    let stored = posts.find_by_id(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.comments.len(), 1);
}
