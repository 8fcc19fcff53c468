use crate::{
    config::Config,
    error::{AppError, Result},
};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

/// 验证码邮件发送。未配置 SMTP 时退化为控制台输出，
/// 开发环境和测试里验证码直接打在日志里。
#[derive(Clone)]
pub struct EmailService {
    config: Config,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self> {
        let transport = if config.smtp_host.is_empty() {
            None
        } else {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| AppError::Email(format!("Failed to create SMTP transport: {}", e)))?
                .port(config.smtp_port);
            if !config.smtp_username.is_empty() {
                builder = builder.credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ));
            }
            Some(builder.build())
        };

        Ok(Self {
            config: config.clone(),
            transport,
        })
    }

    pub async fn send_verification_code(&self, to: &str, code: &str) -> Result<()> {
        let transport = match &self.transport {
            Some(transport) => transport,
            None => {
                info!("SMTP not configured, verification code for {}: {}", to, code);
                return Ok(());
            }
        };

        let from: Mailbox = format!("{} <{}>", self.config.smtp_from_name, self.config.smtp_from_email)
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid sender address: {}", e)))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject("Your verification code")
            .body(format!(
                "Your verification code is {}. It expires in 6 hours.",
                code
            ))
            .map_err(|e| AppError::Email(format!("Failed to build email: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("Failed to send email: {}", e)))?;
        Ok(())
    }
}
