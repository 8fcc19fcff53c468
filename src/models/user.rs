use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
    Moderator,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// 管理员或版主，用于举报处理和强制删除
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Moderator)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

/// 注册用户。帖子内部引用该ID，但绝不对其他用户公开。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub gender: String,
    pub birth_year: i32,
    #[serde(default)]
    pub profile_image_urls: Vec<String>,
    pub location: Option<String>,
    pub preferred_language: Option<String>,
    pub about_me: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    pub suspended_until: Option<DateTime<Utc>>,
    pub verified: bool,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    #[serde(skip_serializing)]
    pub verification_code_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub verification_email_sent_at: Option<DateTime<Utc>>,
}

impl User {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        email: String,
        password: String,
        gender: String,
        birth_year: i32,
        profile_image_urls: Vec<String>,
        location: Option<String>,
        preferred_language: Option<String>,
        about_me: Option<String>,
        role: UserRole,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            password,
            gender,
            birth_year,
            profile_image_urls,
            location,
            preferred_language,
            about_me,
            role,
            suspended_until: None,
            verified: false,
            verification_code: None,
            verification_code_expires_at: None,
            verification_email_sent_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(min = 1, max = 20))]
    pub gender: String,

    #[validate(range(min = 1900, max = 2100))]
    pub birth_year: i32,

    #[serde(default)]
    pub profile_image_urls: Vec<String>,

    #[validate(length(max = 100))]
    pub location: Option<String>,

    #[validate(length(max = 20))]
    pub preferred_language: Option<String>,

    #[validate(length(max = 1000))]
    pub about_me: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 6))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SuspendUserRequest {
    #[validate(range(min = 1, max = 527040))]
    pub minutes: i64,
}
