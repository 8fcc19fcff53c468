pub mod auth;
pub mod authorization;
pub mod email;
pub mod media;
pub mod notification;
pub mod post;
pub mod user;

// 重新导出常用类型
pub use auth::AuthService;
pub use email::EmailService;
pub use media::MediaService;
pub use notification::NotificationService;
pub use post::PostService;
pub use user::UserService;
