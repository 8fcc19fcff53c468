use crate::{
    config::Config,
    error::{AppError, Result},
    models::media::{PresignedUpload, UploadUrlRequest},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

type HmacSha256 = Hmac<Sha256>;

/// 生成限时的 HMAC 签名上传地址。存储后端只需校验同一签名，
/// 核心不关心文件实际落在哪里。
#[derive(Clone)]
pub struct MediaService {
    config: Config,
}

impl MediaService {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn create_upload_url(&self, request: UploadUrlRequest) -> Result<PresignedUpload> {
        request.validate().map_err(AppError::ValidatorError)?;

        let file_key = match request.file_name.rsplit_once('.') {
            Some((_, extension)) if !extension.is_empty() => {
                format!("{}/{}.{}", Utc::now().format("%Y%m%d"), Uuid::new_v4(), extension)
            }
            _ => format!("{}/{}", Utc::now().format("%Y%m%d"), Uuid::new_v4()),
        };
        let expires = Utc::now().timestamp() + self.config.media_url_ttl as i64;

        let mut mac = HmacSha256::new_from_slice(self.config.media_signing_secret.as_bytes())
            .map_err(|_| AppError::internal("Invalid media signing secret"))?;
        mac.update(format!("{}\n{}\n{}", file_key, request.content_type, expires).as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        let url = format!(
            "{}/{}?contentType={}&expires={}&signature={}",
            self.config.media_base_url,
            file_key,
            urlencoding::encode(&request.content_type),
            expires,
            signature,
        );
        debug!("Generated upload url for {} -> {}", request.file_name, file_key);

        Ok(PresignedUpload { url, file_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "test".to_string(),
            log_level: "info".to_string(),
            database_backend: "memory".to_string(),
            database_url: String::new(),
            database_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_expiry_seconds: 3600,
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_from_name: "Whisper Board".to_string(),
            smtp_from_email: "noreply@whisper-board.com".to_string(),
            media_base_url: "http://localhost:9000/uploads".to_string(),
            media_signing_secret: "media-secret".to_string(),
            media_url_ttl: 900,
            max_post_length: 10000,
            max_comment_length: 5000,
            rate_limit_requests: 100,
            rate_limit_window: 60,
            cors_allowed_origins: "http://localhost:3001".to_string(),
        }
    }

    #[test]
    fn upload_url_keeps_extension_and_signature() {
        let service = MediaService::new(&test_config());
        let upload = service
            .create_upload_url(UploadUrlRequest {
                file_name: "selfie.png".to_string(),
                content_type: "image/png".to_string(),
            })
            .unwrap();

        assert!(upload.file_key.ends_with(".png"));
        assert!(upload.url.starts_with("http://localhost:9000/uploads/"));
        assert!(upload.url.contains("signature="));
        assert!(upload.url.contains("contentType=image%2Fpng"));
    }

    #[test]
    fn upload_url_rejects_empty_file_name() {
        let service = MediaService::new(&test_config());
        let result = service.create_upload_url(UploadUrlRequest {
            file_name: String::new(),
            content_type: "image/png".to_string(),
        });
        assert!(result.is_err());
    }
}
