use crate::{
    error::{AppError, Result},
    models::user::SuspendUserRequest,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user))
        .route("/:id", delete(delete_user))
        .route("/:id/suspend", post(suspend_user))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    if !user.is_staff() {
        return Err(AppError::forbidden("Moderator capability required"));
    }

    let users = state.user_service.get_users().await?;

    Ok(Json(json!({
        "success": true,
        "data": users
    })))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let found = state
        .user_service
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(json!({
        "success": true,
        "data": found
    })))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    if user.user_id != id && !user.is_admin() {
        return Err(AppError::forbidden("You can only delete your own account"));
    }

    let deleted = state.user_service.delete_user(&id).await?;
    if !deleted {
        return Err(AppError::not_found("User"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully"
    })))
}

async fn suspend_user(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
    Json(request): Json<SuspendUserRequest>,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    if !user.is_staff() {
        return Err(AppError::forbidden("Moderator capability required"));
    }
    request.validate().map_err(AppError::ValidatorError)?;

    let suspended = state
        .user_service
        .suspend_user(&id, request.minutes)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(json!({
        "success": true,
        "data": suspended
    })))
}
