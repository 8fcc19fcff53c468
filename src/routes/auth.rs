use crate::{
    error::{AppError, Result},
    models::user::{LoginRequest, ResendVerificationRequest, SignupRequest, VerifyEmailRequest},
    services::user::ResendResult,
    state::AppState,
};
use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/verify", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/token", post(token))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<Value>> {
    let user = state.user_service.signup(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": user
    })))
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<Value>> {
    request.validate().map_err(AppError::ValidatorError)?;

    let verified = state
        .user_service
        .verify_email(&request.email, &request.code)
        .await?;

    if !verified {
        return Err(AppError::bad_request("Invalid or expired verification code"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Email verified successfully"
    })))
}

async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResendVerificationRequest>,
) -> Result<Json<Value>> {
    request.validate().map_err(AppError::ValidatorError)?;

    match state.user_service.resend_verification(&request.email).await? {
        ResendResult::Success => Ok(Json(json!({
            "success": true,
            "message": "Verification email sent"
        }))),
        ResendResult::AlreadyVerified => Err(AppError::conflict("Email is already verified")),
        ResendResult::CoolDown => Err(AppError::RateLimitExceeded),
        ResendResult::UserNotFound => Err(AppError::not_found("User")),
    }
}

async fn token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>> {
    request.validate().map_err(AppError::ValidatorError)?;

    let token = state
        .auth_service
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token
        }
    })))
}
