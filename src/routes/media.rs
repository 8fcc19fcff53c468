use crate::{
    error::{AppError, Result},
    models::media::UploadUrlRequest,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/upload-url", post(create_upload_url))
}

async fn create_upload_url(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<UploadUrlRequest>,
) -> Result<Json<Value>> {
    user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let upload = state.media_service.create_upload_url(request)?;

    Ok(Json(json!({
        "success": true,
        "data": upload
    })))
}
