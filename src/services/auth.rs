use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::{User, UserRole},
    repository::UserRepository,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户ID
    pub sub: String,
    pub role: UserRole,
    /// 本次令牌携带的匿名ID，发帖/评论时对外展示的唯一作者标识
    pub anon: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct AuthService {
    config: Config,
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(config: &Config, users: Arc<dyn UserRepository>) -> Self {
        Self {
            config: config.clone(),
            users,
        }
    }

    /// 校验邮箱密码并签发令牌。每次登录都会生成新的匿名ID，
    /// 真实用户ID与公开身份因此不会被长期关联。
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(password, &user.password) {
            warn!("Login failed for email {}", email);
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        if !user.verified {
            return Err(AppError::Authentication("Email is not verified".to_string()));
        }

        self.generate_token(&user)
    }

    pub fn generate_token(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            role: user.role,
            anon: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.jwt_expiry_seconds,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_ref()),
        )?;
        Ok(token)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
