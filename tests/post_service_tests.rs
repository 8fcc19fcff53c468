use chrono::{Duration, Utc};
use std::sync::Arc;
use whisper_board::{
    error::AppError,
    models::{
        post::{CommentRequest, CreatePostRequest, UpdatePostRequest},
        user::{User, UserRole},
    },
    repository::{
        memory::{
            InMemoryNotificationRepository, InMemoryPostRepository, InMemoryUserRepository,
        },
        PostRepository, UserRepository,
    },
    services::PostService,
};

fn setup() -> (
    PostService,
    Arc<InMemoryPostRepository>,
    Arc<InMemoryUserRepository>,
) {
    let posts = Arc::new(InMemoryPostRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());
    let notifications = Arc::new(InMemoryNotificationRepository::new());
    let service = PostService::new(posts.clone(), users.clone(), notifications);
    (service, posts, users)
}

fn text_post(text: &str) -> CreatePostRequest {
    CreatePostRequest {
        text: text.to_string(),
        attachments: Vec::new(),
        gender: None,
    }
}

fn comment(text: &str) -> CommentRequest {
    CommentRequest {
        text: text.to_string(),
        attachments: Vec::new(),
        parent_comment_id: None,
    }
}

fn reply(text: &str, parent_id: &str) -> CommentRequest {
    CommentRequest {
        text: text.to_string(),
        attachments: Vec::new(),
        parent_comment_id: Some(parent_id.to_string()),
    }
}

fn sample_user(id: &str) -> User {
    let mut user = User::new(
        format!("user-{}", id),
        format!("{}@example.com", id),
        "hash".to_string(),
        "OTHER".to_string(),
        1990,
        Vec::new(),
        None,
        None,
        None,
        UserRole::User,
    );
    user.id = id.to_string();
    user.verified = true;
    user
}

#[tokio::test]
async fn viewing_a_post_increases_view_count() {
    let (service, _, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();

    let fetched = service.get_post(&post.id, None).await.unwrap().unwrap();
    assert_eq!(fetched.view_count, 1);

    let fetched = service.get_post(&post.id, None).await.unwrap().unwrap();
    assert_eq!(fetched.view_count, 2);
}

#[tokio::test]
async fn deleted_posts_are_returned_without_counting_views() {
    let (service, posts, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();
    service.get_post(&post.id, None).await.unwrap();
    posts.delete_post(&post.id).await.unwrap();

    let fetched = service.get_post(&post.id, None).await.unwrap().unwrap();
    assert!(fetched.deleted);
    assert_eq!(fetched.view_count, 1);

    assert!(service.get_post("missing", None).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_views_never_lose_updates() {
    let (service, _, _) = setup();
    let post = service.create_post(text_post("hot"), "u1", "anon1").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = service.clone();
        let id = post.id.clone();
        handles.push(tokio::spawn(async move {
            service.get_post(&id, None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let fetched = service.get_post(&post.id, None).await.unwrap().unwrap();
    assert_eq!(fetched.view_count, 21);
}

#[tokio::test]
async fn author_can_edit_post() {
    let (service, _, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();

    let updated = service
        .update_post(
            &post.id,
            UpdatePostRequest {
                text: Some("bye".to_string()),
                attachments: None,
                gender: None,
            },
            "u1",
        )
        .await
        .unwrap();
    assert_eq!(updated.unwrap().text, "bye");
}

#[tokio::test]
async fn non_author_cannot_edit_post() {
    let (service, _, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();

    let updated = service
        .update_post(
            &post.id,
            UpdatePostRequest {
                text: Some("bye".to_string()),
                attachments: None,
                gender: None,
            },
            "u2",
        )
        .await
        .unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn admin_role_does_not_grant_edit() {
    // 管理员可以删除别人的帖子，但编辑仍然只属于作者本人
    let (service, _, users) = setup();
    let mut admin = sample_user("admin");
    admin.role = UserRole::Admin;
    users.save(admin).await.unwrap();

    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();

    let updated = service
        .update_post(
            &post.id,
            UpdatePostRequest {
                text: Some("bye".to_string()),
                attachments: None,
                gender: None,
            },
            "admin",
        )
        .await
        .unwrap();
    assert!(updated.is_none());

    assert!(service.delete_post(&post.id, "admin", true).await.unwrap());
}

#[tokio::test]
async fn comments_track_post_author_flag() {
    let (service, _, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();

    let by_other = service
        .add_comment(&post.id, comment("hi"), "u2", "anon2")
        .await
        .unwrap()
        .unwrap();
    assert!(!by_other.by_post_author);

    let by_author = service
        .add_comment(&post.id, reply("it's me", &by_other.id), "u1", "anon1")
        .await
        .unwrap()
        .unwrap();
    assert!(by_author.by_post_author);
}

#[tokio::test]
async fn comment_on_missing_post_or_parent_fails() {
    let (service, _, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();

    assert!(service
        .add_comment("missing", comment("hi"), "u2", "anon2")
        .await
        .unwrap()
        .is_none());
    assert!(service
        .add_comment(&post.id, reply("hi", "missing-parent"), "u2", "anon2")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn delete_marks_post_and_comment() {
    let (service, posts, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();
    let top = service
        .add_comment(&post.id, comment("hi"), "u2", "anon2")
        .await
        .unwrap()
        .unwrap();
    let child = service
        .add_comment(&post.id, reply("reply", &top.id), "u3", "anon3")
        .await
        .unwrap()
        .unwrap();

    assert!(service
        .delete_comment(&post.id, &child.id, "u3", false, Some(&top.id))
        .await
        .unwrap());
    assert!(service.delete_post(&post.id, "u1", false).await.unwrap());

    // 软删除：树保持原样，只有标记翻转
    let stored = posts.find_by_id(&post.id).await.unwrap().unwrap();
    assert!(stored.deleted);
    assert_eq!(stored.comments.len(), 1);
    assert!(!stored.comments[0].deleted);
    assert!(stored.comments[0].replies[0].deleted);
}

#[tokio::test]
async fn deleting_a_parent_comment_leaves_replies_deletable() {
    let (service, posts, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();
    let top = service
        .add_comment(&post.id, comment("hi"), "u2", "anon2")
        .await
        .unwrap()
        .unwrap();
    let child = service
        .add_comment(&post.id, reply("reply", &top.id), "u3", "anon3")
        .await
        .unwrap()
        .unwrap();

    assert!(service
        .delete_comment(&post.id, &top.id, "u2", false, None)
        .await
        .unwrap());

    let stored = posts.find_by_id(&post.id).await.unwrap().unwrap();
    assert!(stored.comments[0].deleted);
    assert!(!stored.comments[0].replies[0].deleted);

    assert!(service
        .delete_comment(&post.id, &child.id, "u3", false, Some(&top.id))
        .await
        .unwrap());
    let stored = posts.find_by_id(&post.id).await.unwrap().unwrap();
    assert!(stored.comments[0].replies[0].deleted);
}

#[tokio::test]
async fn comment_deletion_requires_ownership_or_admin() {
    let (service, posts, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();
    let top = service
        .add_comment(&post.id, comment("hi"), "u2", "anon2")
        .await
        .unwrap()
        .unwrap();
    let child = service
        .add_comment(&post.id, reply("mine", &top.id), "u1", "anon1")
        .await
        .unwrap()
        .unwrap();

    // 非作者、非管理员：拒绝且标记不变
    assert!(!service
        .delete_comment(&post.id, &child.id, "u2", false, Some(&top.id))
        .await
        .unwrap());
    let stored = posts.find_by_id(&post.id).await.unwrap().unwrap();
    assert!(!stored.comments[0].replies[0].deleted);

    // 作者本人：允许
    assert!(service
        .delete_comment(&post.id, &child.id, "u1", false, Some(&top.id))
        .await
        .unwrap());
    let stored = posts.find_by_id(&post.id).await.unwrap().unwrap();
    assert!(stored.comments[0].replies[0].deleted);
}

#[tokio::test]
async fn report_and_moderate() {
    let (service, posts, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();

    service.report_post(&post.id).await.unwrap();
    service.report_post(&post.id).await.unwrap();
    let reported = posts.find_by_id(&post.id).await.unwrap().unwrap();
    assert_eq!(reported.report_count, 2);

    // delete=false 只清零举报数
    let moderated = service.moderate_post(&post.id, false, true).await.unwrap().unwrap();
    assert!(!moderated.deleted);
    assert_eq!(moderated.report_count, 0);

    service.report_post(&post.id).await.unwrap();
    let moderated = service.moderate_post(&post.id, true, true).await.unwrap().unwrap();
    assert!(moderated.deleted);
    assert_eq!(moderated.report_count, 0);
}

#[tokio::test]
async fn moderation_requires_capability() {
    let (service, posts, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();
    service.report_post(&post.id).await.unwrap();

    let result = service.moderate_post(&post.id, true, false).await.unwrap();
    assert!(result.is_none());

    let stored = posts.find_by_id(&post.id).await.unwrap().unwrap();
    assert!(!stored.deleted);
    assert_eq!(stored.report_count, 1);
}

#[tokio::test]
async fn reported_feed_skips_deleted_posts() {
    let (service, _, _) = setup();
    let kept = service.create_post(text_post("kept"), "u1", "anon1").await.unwrap();
    let removed = service.create_post(text_post("removed"), "u2", "anon2").await.unwrap();

    service.report_post(&kept.id).await.unwrap();
    service.report_post(&removed.id).await.unwrap();
    service.delete_post(&removed.id, "u2", false).await.unwrap();

    let reported = service.get_reported_posts(None).await.unwrap();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].id, kept.id);
}

#[tokio::test]
async fn suspended_user_cannot_create_content() {
    let (service, _, users) = setup();

    let mut suspended = sample_user("u5");
    suspended.suspended_until = Some(Utc::now() + Duration::minutes(10));
    users.save(suspended).await.unwrap();

    let result = service.create_post(text_post("no"), "u5", "anon5").await;
    assert!(matches!(result, Err(AppError::Suspended)));

    let post = service.create_post(text_post("target"), "u1", "anon1").await.unwrap();
    let result = service.add_comment(&post.id, comment("no"), "u5", "anon5").await;
    assert!(matches!(result, Err(AppError::Suspended)));
}

#[tokio::test]
async fn expired_suspension_allows_creation() {
    let (service, _, users) = setup();

    let mut expired = sample_user("u6");
    expired.suspended_until = Some(Utc::now() - Duration::minutes(1));
    users.save(expired).await.unwrap();

    let post = service.create_post(text_post("back"), "u6", "anon6").await.unwrap();
    assert_eq!(post.text, "back");
}

#[tokio::test]
async fn suspension_does_not_block_deletes() {
    let (service, _, users) = setup();
    let post = service.create_post(text_post("mine"), "u7", "anon7").await.unwrap();

    let mut suspended = sample_user("u7");
    suspended.suspended_until = Some(Utc::now() + Duration::minutes(10));
    users.save(suspended).await.unwrap();

    assert!(service.delete_post(&post.id, "u7", false).await.unwrap());
}

#[tokio::test]
async fn get_posts_with_limit_and_offset() {
    let (service, _, _) = setup();
    service.create_post(text_post("p1"), "u1", "a1").await.unwrap();
    service.create_post(text_post("p2"), "u2", "a2").await.unwrap();
    service.create_post(text_post("p3"), "u3", "a3").await.unwrap();

    let first_two = service.get_posts(0, Some(2), None).await.unwrap();
    assert_eq!(first_two.len(), 2);

    let last_one = service.get_posts(2, Some(1), None).await.unwrap();
    assert_eq!(last_one.len(), 1);
    assert_eq!(last_one[0].text, "p3");
}

#[tokio::test]
async fn projection_is_relative_to_requester() {
    let (service, _, _) = setup();
    let post = service.create_post(text_post("hello"), "u1", "anon1").await.unwrap();
    let top = service
        .add_comment(&post.id, comment("hi"), "u2", "anon2")
        .await
        .unwrap()
        .unwrap();
    service
        .add_comment(&post.id, reply("back", &top.id), "u1", "anon1")
        .await
        .unwrap()
        .unwrap();

    let seen_by_author = service.get_post(&post.id, Some("u1")).await.unwrap().unwrap();
    assert!(seen_by_author.can_delete);
    assert!(!seen_by_author.comments[0].can_delete);
    assert!(seen_by_author.comments[0].replies[0].can_delete);

    let seen_by_commenter = service.get_post(&post.id, Some("u2")).await.unwrap().unwrap();
    assert!(!seen_by_commenter.can_delete);
    assert!(seen_by_commenter.comments[0].can_delete);
    assert!(!seen_by_commenter.comments[0].replies[0].can_delete);

    // 匿名读取保持默认 false
    let public_view = service.get_post(&post.id, None).await.unwrap().unwrap();
    assert!(!public_view.can_delete);
    assert!(!public_view.comments[0].can_delete);
}

#[tokio::test]
async fn posts_by_user_only_returns_that_author() {
    let (service, _, _) = setup();
    service.create_post(text_post("mine"), "u1", "a1").await.unwrap();
    service.create_post(text_post("other"), "u2", "a2").await.unwrap();

    let posts = service.get_posts_by_user("u1", Some("u1")).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "mine");
    assert!(posts[0].can_delete);
}
