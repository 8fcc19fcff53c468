use crate::{
    error::{AppError, Result},
    models::user::{SignupRequest, User, UserRole},
    repository::UserRepository,
    services::{auth, EmailService},
    utils::validation::normalize_email,
};
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

const VERIFICATION_CODE_TTL_HOURS: i64 = 6;
const RESEND_COOL_DOWN_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendResult {
    Success,
    AlreadyVerified,
    CoolDown,
    UserNotFound,
}

/// 用户注册、邮箱验证与停权逻辑。
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    email: EmailService,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, email: EmailService) -> Self {
        Self { users, email }
    }

    /// 注册新用户。已验证的邮箱直接拒绝；未验证的旧账号删除后
    /// 重新注册，验证码随邮件发出。
    pub async fn signup(&self, request: SignupRequest) -> Result<User> {
        request.validate().map_err(AppError::ValidatorError)?;
        let email = normalize_email(&request.email);
        info!("Signing up user with email: {}", email);

        if let Some(existing) = self.users.find_by_email(&email).await? {
            if existing.verified {
                return Err(AppError::conflict("User with this email already exists"));
            }
            info!(
                "User with email {} exists but is not verified, deleting old account to re-signup",
                email
            );
            self.users.delete_by_id(&existing.id).await?;
        }

        let code = generate_verification_code();
        let now = Utc::now();

        let mut user = User::new(
            request.name,
            email.clone(),
            auth::hash_password(&request.password)?,
            request.gender,
            request.birth_year,
            request.profile_image_urls,
            request.location,
            request.preferred_language,
            request.about_me,
            UserRole::User,
        );
        user.verification_code = Some(code.clone());
        user.verification_code_expires_at = Some(now + Duration::hours(VERIFICATION_CODE_TTL_HOURS));
        user.verification_email_sent_at = Some(now);

        let saved = self.users.save(user).await?;
        self.email.send_verification_code(&email, &code).await?;
        Ok(saved)
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> Result<bool> {
        let email = normalize_email(email);
        info!("Verifying email for: {}", email);
        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => return Ok(false),
        };

        if let Some(expires_at) = user.verification_code_expires_at {
            if expires_at < Utc::now() {
                warn!("Verification code for email {} has expired", email);
                let mut expired = user;
                expired.verification_code = None;
                expired.verification_code_expires_at = None;
                self.users.save(expired).await?;
                return Ok(false);
            }
        }

        if user.verification_code.as_deref() == Some(code) {
            let mut verified = user;
            verified.verified = true;
            verified.verification_code = None;
            verified.verification_code_expires_at = None;
            verified.verification_email_sent_at = None;
            self.users.save(verified).await?;
            return Ok(true);
        }

        Ok(false)
    }

    pub async fn resend_verification(&self, email: &str) -> Result<ResendResult> {
        let email = normalize_email(email);
        info!("Resending verification email for: {}", email);
        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => return Ok(ResendResult::UserNotFound),
        };

        if user.verified {
            warn!("User with email {} is already verified", email);
            return Ok(ResendResult::AlreadyVerified);
        }

        let now = Utc::now();
        if let Some(sent_at) = user.verification_email_sent_at {
            if now < sent_at + Duration::seconds(RESEND_COOL_DOWN_SECONDS) {
                warn!("Resend verification email for {} is on cooldown", email);
                return Ok(ResendResult::CoolDown);
            }
        }

        let code = generate_verification_code();
        let mut updated = user;
        updated.verification_code = Some(code.clone());
        updated.verification_code_expires_at = Some(now + Duration::hours(VERIFICATION_CODE_TTL_HOURS));
        updated.verification_email_sent_at = Some(now);

        self.users.save(updated).await?;
        self.email.send_verification_code(&email, &code).await?;
        Ok(ResendResult::Success)
    }

    pub async fn get_users(&self) -> Result<Vec<User>> {
        info!("Getting all users");
        self.users.find_all().try_collect().await
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.users.find_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.users.find_by_email(&normalize_email(email)).await
    }

    /// 用户删除后帖子仍保留 author_id，历史内容不受影响
    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        info!("Deleting user with id: {}", id);
        self.users.delete_by_id(id).await
    }

    pub async fn suspend_user(&self, id: &str, minutes: i64) -> Result<Option<User>> {
        let until = Utc::now() + Duration::minutes(minutes);
        info!("Suspending user with id: {} until: {}", id, until);
        let user = match self.users.find_by_id(id).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        let mut updated = user;
        updated.suspended_until = Some(until);
        Ok(Some(self.users.save(updated).await?))
    }

    pub async fn is_suspended(&self, id: &str) -> Result<bool> {
        let user = match self.users.find_by_id(id).await? {
            Some(user) => user,
            None => return Ok(false),
        };
        match user.suspended_until {
            Some(until) => Ok(Utc::now() < until),
            None => Ok(false),
        }
    }
}

fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}
