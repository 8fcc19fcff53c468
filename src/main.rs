use std::sync::Arc;
use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, Router},
};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whisper_board::{
    config::Config,
    repository::{
        memory::{InMemoryNotificationRepository, InMemoryPostRepository, InMemoryUserRepository},
        postgres::{
            ensure_schema, PostgresNotificationRepository, PostgresPostRepository,
            PostgresUserRepository,
        },
        NotificationRepository, PostRepository, UserRepository,
    },
    routes,
    services::{
        AuthService, EmailService, MediaService, NotificationService, PostService, UserService,
    },
    state::AppState,
    utils::middleware as app_middleware,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| "whisper_board=debug,tower_http=debug".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Whisper-Board service...");

    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 选择持久化后端：组装时显式决定，不做隐式环境切换
    let (post_repo, user_repo, notification_repo): (
        Arc<dyn PostRepository>,
        Arc<dyn UserRepository>,
        Arc<dyn NotificationRepository>,
    ) = match config.database_backend.as_str() {
        "postgres" => {
            info!("Using postgres repositories");
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&config.database_url)
                .await?;
            ensure_schema(&pool).await?;
            info!("Database connection established successfully");
            (
                Arc::new(PostgresPostRepository::new(pool.clone())),
                Arc::new(PostgresUserRepository::new(pool.clone())),
                Arc::new(PostgresNotificationRepository::new(pool)),
            )
        }
        _ => {
            info!("Using in-memory repositories");
            (
                Arc::new(InMemoryPostRepository::new()),
                Arc::new(InMemoryUserRepository::new()),
                Arc::new(InMemoryNotificationRepository::new()),
            )
        }
    };

    // 初始化所有服务
    let email_service = EmailService::new(&config)?;
    let auth_service = AuthService::new(&config, user_repo.clone());
    let user_service = UserService::new(user_repo.clone(), email_service);
    let post_service = PostService::new(post_repo, user_repo, notification_repo.clone());
    let notification_service = NotificationService::new(notification_repo);
    let media_service = MediaService::new(&config);

    // 创建应用状态
    let app_state = Arc::new(AppState {
        config: config.clone(),
        auth_service,
        user_service,
        post_service,
        notification_service,
        media_service,
    });

    // 配置 CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(
            config.cors_allowed_origins
                .split(',')
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        );

    // 构建应用路由
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/auth", routes::auth::router())
        .nest("/api/users", routes::users::router())
        .nest("/api/posts", routes::posts::router())
        .nest("/api/notifications", routes::notifications::router())
        .nest("/api/media", routes::media::router())
        .layer(middleware::from_fn_with_state(app_state.clone(), app_middleware::auth_middleware))
        .layer(middleware::from_fn_with_state(app_state.clone(), app_middleware::rate_limit_middleware))
        .layer(middleware::from_fn(app_middleware::request_logging_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "Whisper-Board is running!"
}
