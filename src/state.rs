use crate::{
    config::Config,
    services::{AuthService, MediaService, NotificationService, PostService, UserService},
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 认证服务
    pub auth_service: AuthService,

    /// 用户服务
    pub user_service: UserService,

    /// 帖子服务
    pub post_service: PostService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// 媒体服务
    pub media_service: MediaService,
}

impl AppState {
    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }

    /// 检查是否为开发环境
    pub fn is_development(&self) -> bool {
        self.config.is_development()
    }
}
