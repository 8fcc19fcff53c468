use crate::{
    error::{AppError, Result},
    models::post::{CommentRequest, CreatePostRequest, UpdatePostRequest},
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_post).get(list_posts))
        .route("/user/:user_id", get(posts_by_user))
        .route("/reported", get(reported_posts))
        .route("/:id", get(get_post))
        .route("/:id", put(update_post))
        .route("/:id", delete(delete_post))
        .route("/:id/report", post(report_post))
        .route("/:id/moderate", post(moderate_post))
        .route("/:id/comments", post(add_comment))
        .route("/:id/comments/:comment_id", delete(delete_comment))
}

#[derive(Debug, Deserialize)]
struct ListPostsQuery {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ModerateQuery {
    #[serde(default)]
    delete: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteCommentQuery {
    parent_comment_id: Option<String>,
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CreatePostRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let post = state
        .post_service
        .create_post(request, &user.user_id, &user.anonymous_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

async fn list_posts(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<Value>> {
    let requester_id = user.as_ref().map(|u| u.user_id.as_str());
    let posts = state
        .post_service
        .get_posts(query.offset, query.limit, requester_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": posts
    })))
}

async fn posts_by_user(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    let requester_id = user.as_ref().map(|u| u.user_id.as_str());
    let posts = state
        .post_service
        .get_posts_by_user(&user_id, requester_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": posts
    })))
}

async fn reported_posts(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    // 非版主拿到空列表而不是错误
    let posts = if user.is_staff() {
        state
            .post_service
            .get_reported_posts(Some(&user.user_id))
            .await?
    } else {
        Vec::new()
    };

    Ok(Json(json!({
        "success": true,
        "data": posts
    })))
}

async fn get_post(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let requester_id = user.as_ref().map(|u| u.user_id.as_str());
    let post = state
        .post_service
        .get_post(&id, requester_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
    Json(request): Json<UpdatePostRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let post = state
        .post_service
        .update_post(&id, request, &user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let deleted = state
        .post_service
        .delete_post(&id, &user.user_id, user.is_admin())
        .await?;

    Ok(Json(json!({
        "success": deleted
    })))
}

async fn report_post(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let post = state
        .post_service
        .report_post(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

async fn moderate_post(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
    Query(query): Query<ModerateQuery>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    if !user.is_staff() {
        return Err(AppError::forbidden("Moderator capability required"));
    }

    let post = state
        .post_service
        .moderate_post(&id, query.delete, true)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let comment = state
        .post_service
        .add_comment(&id, request, &user.user_id, &user.anonymous_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post or parent comment"))?;

    Ok(Json(json!({
        "success": true,
        "data": comment
    })))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path((post_id, comment_id)): Path<(String, String)>,
    Query(query): Query<DeleteCommentQuery>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let deleted = state
        .post_service
        .delete_comment(
            &post_id,
            &comment_id,
            &user.user_id,
            user.is_admin(),
            query.parent_comment_id.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "success": deleted
    })))
}
