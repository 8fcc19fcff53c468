//! sqlx/Postgres 后端。评论以扁平行存储，读取时按 parent_comment_id
//! 重新组装成树；浏览计数通过条件 UPDATE .. RETURNING 原子递增。

use crate::{
    error::{AppError, Result},
    models::{
        notification::Notification,
        post::{Attachment, Comment, Post},
        user::{User, UserRole},
    },
    repository::{NotificationRepository, PostRepository, PostStream, UserRepository, UserStream},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream, TryStreamExt};
use sqlx::{types::Json, FromRow, PgPool};
use std::collections::HashMap;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        gender TEXT NOT NULL,
        birth_year INT NOT NULL,
        profile_image_urls JSONB NOT NULL DEFAULT '[]',
        location TEXT,
        preferred_language TEXT,
        about_me TEXT,
        role TEXT NOT NULL DEFAULT 'USER',
        suspended_until TIMESTAMPTZ,
        verified BOOLEAN NOT NULL DEFAULT FALSE,
        verification_code TEXT,
        verification_code_expires_at TIMESTAMPTZ,
        verification_email_sent_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        text TEXT NOT NULL,
        attachments JSONB NOT NULL DEFAULT '[]',
        gender TEXT,
        author_id TEXT NOT NULL,
        anonymous_id TEXT NOT NULL,
        view_count BIGINT NOT NULL DEFAULT 0,
        deleted BOOLEAN NOT NULL DEFAULT FALSE,
        report_count BIGINT NOT NULL DEFAULT 0,
        seq BIGSERIAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL REFERENCES posts(id),
        author_id TEXT NOT NULL,
        anonymous_id TEXT NOT NULL,
        text TEXT NOT NULL,
        attachments JSONB NOT NULL DEFAULT '[]',
        parent_comment_id TEXT,
        by_post_author BOOLEAN NOT NULL DEFAULT FALSE,
        deleted BOOLEAN NOT NULL DEFAULT FALSE,
        seq BIGSERIAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        source_post_id TEXT NOT NULL,
        source_comment_id TEXT,
        triggering_anonymous_id TEXT NOT NULL,
        message TEXT NOT NULL,
        read BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id)",
];

pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn role_to_str(role: UserRole) -> &'static str {
    match role {
        UserRole::User => "USER",
        UserRole::Admin => "ADMIN",
        UserRole::Moderator => "MODERATOR",
    }
}

fn role_from_str(role: &str) -> UserRole {
    match role {
        "ADMIN" => UserRole::Admin,
        "MODERATOR" => UserRole::Moderator,
        _ => UserRole::User,
    }
}

#[derive(FromRow)]
struct PostRow {
    id: String,
    text: String,
    attachments: Json<Vec<Attachment>>,
    gender: Option<String>,
    author_id: String,
    anonymous_id: String,
    view_count: i64,
    deleted: bool,
    report_count: i64,
}

#[derive(FromRow, Clone)]
struct CommentRow {
    id: String,
    post_id: String,
    author_id: String,
    anonymous_id: String,
    text: String,
    attachments: Json<Vec<Attachment>>,
    parent_comment_id: Option<String>,
    by_post_author: bool,
    deleted: bool,
}

const POST_COLUMNS: &str =
    "id, text, attachments, gender, author_id, anonymous_id, view_count, deleted, report_count";
const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, anonymous_id, text, attachments, parent_comment_id, by_post_author, deleted";

fn build_comment(row: &CommentRow, all: &[CommentRow]) -> Comment {
    let replies = all
        .iter()
        .filter(|r| r.parent_comment_id.as_deref() == Some(row.id.as_str()))
        .map(|r| build_comment(r, all))
        .collect();
    Comment {
        id: row.id.clone(),
        post_id: row.post_id.clone(),
        author_id: row.author_id.clone(),
        anonymous_id: row.anonymous_id.clone(),
        text: row.text.clone(),
        attachments: row.attachments.0.clone(),
        parent_comment_id: row.parent_comment_id.clone(),
        replies,
        by_post_author: row.by_post_author,
        deleted: row.deleted,
        can_delete: false,
    }
}

fn assemble(row: PostRow, comment_rows: &[CommentRow]) -> Post {
    let comments = comment_rows
        .iter()
        .filter(|r| r.parent_comment_id.is_none())
        .map(|r| build_comment(r, comment_rows))
        .collect();
    Post {
        id: row.id,
        text: row.text,
        attachments: row.attachments.0,
        gender: row.gender,
        author_id: row.author_id,
        anonymous_id: row.anonymous_id,
        comments,
        view_count: row.view_count,
        deleted: row.deleted,
        report_count: row.report_count,
        can_delete: false,
    }
}

enum PostQuery {
    All,
    ByAuthor(String),
    Reported,
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_post(&self, id: &str) -> Result<Option<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let query =
                    format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY seq");
                let comment_rows = sqlx::query_as::<_, CommentRow>(&query)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?;
                Ok(Some(assemble(row, &comment_rows)))
            }
            None => Ok(None),
        }
    }

    async fn load_posts(&self, which: PostQuery) -> Result<Vec<Post>> {
        let rows = match which {
            PostQuery::All => {
                let query = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY seq");
                sqlx::query_as::<_, PostRow>(&query).fetch_all(&self.pool).await?
            }
            PostQuery::ByAuthor(author_id) => {
                let query =
                    format!("SELECT {POST_COLUMNS} FROM posts WHERE author_id = $1 ORDER BY seq");
                sqlx::query_as::<_, PostRow>(&query)
                    .bind(author_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            PostQuery::Reported => {
                let query = format!(
                    "SELECT {POST_COLUMNS} FROM posts WHERE report_count > 0 AND deleted = false ORDER BY seq"
                );
                sqlx::query_as::<_, PostRow>(&query).fetch_all(&self.pool).await?
            }
        };

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let query =
            format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ANY($1) ORDER BY seq");
        let comment_rows = sqlx::query_as::<_, CommentRow>(&query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: HashMap<String, Vec<CommentRow>> = HashMap::new();
        for row in comment_rows {
            grouped.entry(row.post_id.clone()).or_default().push(row);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let comments = grouped.get(&row.id).map(Vec::as_slice).unwrap_or(&[]);
                assemble(row, comments)
            })
            .collect())
    }

    fn stream_posts(&self, which: PostQuery) -> PostStream {
        let repo = self.clone();
        Box::pin(
            stream::once(async move {
                let posts = repo.load_posts(which).await?;
                Ok::<_, AppError>(stream::iter(posts.into_iter().map(Ok)))
            })
            .try_flatten(),
        )
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn save(&self, post: Post) -> Result<Post> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, text, attachments, gender, author_id, anonymous_id, view_count, deleted, report_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                text = EXCLUDED.text,
                attachments = EXCLUDED.attachments,
                gender = EXCLUDED.gender,
                view_count = EXCLUDED.view_count,
                deleted = EXCLUDED.deleted,
                report_count = EXCLUDED.report_count
            "#,
        )
        .bind(&post.id)
        .bind(&post.text)
        .bind(Json(&post.attachments))
        .bind(&post.gender)
        .bind(&post.author_id)
        .bind(&post.anonymous_id)
        .bind(post.view_count)
        .bind(post.deleted)
        .bind(post.report_count)
        .execute(&self.pool)
        .await?;
        Ok(post)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Post>> {
        self.load_post(id).await
    }

    fn find_all(&self) -> PostStream {
        self.stream_posts(PostQuery::All)
    }

    fn find_by_author_id(&self, author_id: &str) -> PostStream {
        self.stream_posts(PostQuery::ByAuthor(author_id.to_string()))
    }

    fn find_reported(&self) -> PostStream {
        self.stream_posts(PostQuery::Reported)
    }

    async fn add_comment(
        &self,
        post_id: &str,
        mut comment: Comment,
        parent_comment_id: Option<&str>,
    ) -> Result<Option<Comment>> {
        // 父检查与插入在同一事务中，锁住帖子行以串行化同一棵树上的写入
        let mut tx = self.pool.begin().await?;

        let post_author: Option<String> =
            sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
        let post_author = match post_author {
            Some(author) => author,
            None => return Ok(None),
        };

        if let Some(parent_id) = parent_comment_id {
            let parent: Option<String> = sqlx::query_scalar(
                "SELECT id FROM comments WHERE id = $1 AND post_id = $2 AND parent_comment_id IS NULL",
            )
            .bind(parent_id)
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
            if parent.is_none() {
                return Ok(None);
            }
        }

        comment.post_id = post_id.to_string();
        comment.parent_comment_id = parent_comment_id.map(str::to_string);
        comment.by_post_author = comment.author_id == post_author;

        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, anonymous_id, text, attachments, parent_comment_id, by_post_author, deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.post_id)
        .bind(&comment.author_id)
        .bind(&comment.anonymous_id)
        .bind(&comment.text)
        .bind(Json(&comment.attachments))
        .bind(&comment.parent_comment_id)
        .bind(comment.by_post_author)
        .bind(comment.deleted)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(comment))
    }

    async fn increment_view_count(&self, id: &str) -> Result<Option<Post>> {
        let updated: Option<String> = sqlx::query_scalar(
            "UPDATE posts SET view_count = view_count + 1 WHERE id = $1 AND deleted = false RETURNING id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        // 已删除的帖子不递增，但仍按原样返回，让上层区分“不存在”和“已删除”
        match updated {
            Some(updated_id) => self.load_post(&updated_id).await,
            None => self.load_post(id).await,
        }
    }

    async fn delete_post(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE posts SET deleted = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<bool> {
        let result = match parent_comment_id {
            None => {
                sqlx::query(
                    "UPDATE comments SET deleted = true WHERE id = $1 AND post_id = $2 AND parent_comment_id IS NULL",
                )
                .bind(comment_id)
                .bind(post_id)
                .execute(&self.pool)
                .await?
            }
            Some(parent_id) => {
                sqlx::query(
                    "UPDATE comments SET deleted = true WHERE id = $1 AND post_id = $2 AND parent_comment_id = $3",
                )
                .bind(comment_id)
                .bind(post_id)
                .bind(parent_id)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    async fn report_post(&self, id: &str) -> Result<Option<Post>> {
        let updated: Option<String> = sqlx::query_scalar(
            "UPDATE posts SET report_count = report_count + 1 WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match updated {
            Some(updated_id) => self.load_post(&updated_id).await,
            None => Ok(None),
        }
    }

    async fn moderate_post(&self, id: &str, delete: bool) -> Result<Option<Post>> {
        let updated: Option<String> = sqlx::query_scalar(
            "UPDATE posts SET deleted = (deleted OR $2), report_count = 0 WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(delete)
        .fetch_optional(&self.pool)
        .await?;
        match updated {
            Some(updated_id) => self.load_post(&updated_id).await,
            None => Ok(None),
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password: String,
    gender: String,
    birth_year: i32,
    profile_image_urls: Json<Vec<String>>,
    location: Option<String>,
    preferred_language: Option<String>,
    about_me: Option<String>,
    role: String,
    suspended_until: Option<DateTime<Utc>>,
    verified: bool,
    verification_code: Option<String>,
    verification_code_expires_at: Option<DateTime<Utc>>,
    verification_email_sent_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            gender: row.gender,
            birth_year: row.birth_year,
            profile_image_urls: row.profile_image_urls.0,
            location: row.location,
            preferred_language: row.preferred_language,
            about_me: row.about_me,
            role: role_from_str(&row.role),
            suspended_until: row.suspended_until,
            verified: row.verified,
            verification_code: row.verification_code,
            verification_code_expires_at: row.verification_code_expires_at,
            verification_email_sent_at: row.verification_email_sent_at,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password, gender, birth_year, profile_image_urls, \
     location, preferred_language, about_me, role, suspended_until, verified, \
     verification_code, verification_code_expires_at, verification_email_sent_at";

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn save(&self, user: User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, gender, birth_year, profile_image_urls,
                               location, preferred_language, about_me, role, suspended_until, verified,
                               verification_code, verification_code_expires_at, verification_email_sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                password = EXCLUDED.password,
                gender = EXCLUDED.gender,
                birth_year = EXCLUDED.birth_year,
                profile_image_urls = EXCLUDED.profile_image_urls,
                location = EXCLUDED.location,
                preferred_language = EXCLUDED.preferred_language,
                about_me = EXCLUDED.about_me,
                role = EXCLUDED.role,
                suspended_until = EXCLUDED.suspended_until,
                verified = EXCLUDED.verified,
                verification_code = EXCLUDED.verification_code,
                verification_code_expires_at = EXCLUDED.verification_code_expires_at,
                verification_email_sent_at = EXCLUDED.verification_email_sent_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.gender)
        .bind(user.birth_year)
        .bind(Json(&user.profile_image_urls))
        .bind(&user.location)
        .bind(&user.preferred_language)
        .bind(&user.about_me)
        .bind(role_to_str(user.role))
        .bind(user.suspended_until)
        .bind(user.verified)
        .bind(&user.verification_code)
        .bind(user.verification_code_expires_at)
        .bind(user.verification_email_sent_at)
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    fn find_all(&self) -> UserStream {
        let pool = self.pool.clone();
        Box::pin(
            stream::once(async move {
                let query = format!("SELECT {USER_COLUMNS} FROM users");
                let rows = sqlx::query_as::<_, UserRow>(&query).fetch_all(&pool).await?;
                Ok::<_, AppError>(stream::iter(rows.into_iter().map(|r| Ok(User::from(r)))))
            })
            .try_flatten(),
        )
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    source_post_id: String,
    source_comment_id: Option<String>,
    triggering_anonymous_id: String,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            user_id: row.user_id,
            source_post_id: row.source_post_id,
            source_comment_id: row.source_comment_id,
            triggering_anonymous_id: row.triggering_anonymous_id,
            message: row.message,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn save(&self, notification: Notification) -> Result<Notification> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, source_post_id, source_comment_id,
                                       triggering_anonymous_id, message, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(&notification.source_post_id)
        .bind(&notification.source_comment_id)
        .bind(&notification.triggering_anonymous_id)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(notification)
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, source_post_id, source_comment_id, triggering_anonymous_id,
                   message, read, created_at
            FROM notifications WHERE user_id = $1 ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_as_read(&self, notification_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET read = true WHERE id = $1")
            .bind(notification_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
