use crate::{
    error::{AppError, Result},
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id/read", post(mark_as_read))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let notifications = state
        .notification_service
        .get_notifications(&user.user_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": notifications
    })))
}

async fn mark_as_read(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let marked = state.notification_service.mark_as_read(&id).await?;
    if !marked {
        return Err(AppError::not_found("Notification"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Notification marked as read"
    })))
}
