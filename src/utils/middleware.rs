use crate::{error::AppError, models::user::UserRole, state::AppState};
use axum::{
    body::Body,
    extract::State,
    headers::{authorization::Bearer, Authorization},
    http::Request,
    middleware::Next,
    response::Response,
    TypedHeader,
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::{num::NonZeroU32, sync::Arc};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;
static RATE_LIMITER: OnceCell<KeyedRateLimiter> = OnceCell::const_new();

/// 认证后的请求身份。user_id 仅用于内部判定，
/// anonymous_id 是写入内容时对外展示的作者标识。
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub anonymous_id: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// 认证中间件。令牌无效时不拦截请求，继续按未认证处理，
/// 由各个处理器自行决定是否要求登录。
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    if let Some(TypedHeader(authorization)) = auth_header {
        match app_state.auth_service.verify_token(authorization.token()) {
            Ok(claims) => {
                debug!("Authenticated user: {}", claims.sub);
                request.extensions_mut().insert(AuthUser {
                    user_id: claims.sub,
                    anonymous_id: claims.anon,
                    role: claims.role,
                });
            }
            Err(e) => {
                debug!("JWT verification failed: {}", e);
            }
        }
    }

    Ok(next.run(request).await)
}

/// 速率限制中间件
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let rate_limiter = RATE_LIMITER
        .get_or_init(|| async {
            let quota = Quota::per_minute(
                NonZeroU32::new(app_state.config.rate_limit_requests)
                    .unwrap_or(NonZeroU32::new(100).unwrap()),
            )
            .allow_burst(NonZeroU32::new(10).unwrap());
            RateLimiter::dashmap(quota)
        })
        .await;

    let client_ip = get_client_ip(&request);

    match rate_limiter.check_key(&client_ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            warn!("Rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 请求日志中间件
pub async fn request_logging_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start_time = std::time::Instant::now();
    let response = next.run(request).await;
    let elapsed = start_time.elapsed();

    info!(
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        response.status().as_u16(),
        elapsed.as_millis()
    );

    response
}

fn get_client_ip(request: &Request<Body>) -> String {
    let headers = request.headers();

    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(ip) = ip_str.split(',').next() {
                return ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    request
        .extensions()
        .get::<std::net::SocketAddr>()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 可选认证提取器
pub struct OptionalAuth(pub Option<AuthUser>);

#[async_trait::async_trait]
impl<S> axum::extract::FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<AuthUser>().cloned();
        Ok(OptionalAuth(user))
    }
}
