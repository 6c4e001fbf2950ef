//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{auth, handlers, WebAppState};
use crate::config::ServerConfig;
use crate::error::Result;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Web服务器
pub struct WebServer {
    state: WebAppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(state: WebAppState) -> Self {
        Self { state }
    }

    /// 启动Web服务器，直到收到关闭信号
    ///
    /// # 参数
    /// * `shutdown_rx` - 关闭信号接收器
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let config = self.state.config.clone();
        let listener = TcpListener::bind((config.bind_address.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;

        if self.state.auth.is_none() {
            warn!("未配置访问密码，API 对所有人开放");
        }

        info!("Web服务器已启动: http://{}", addr);
        info!("仪表板地址: http://{}/", addr);

        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}

/// 创建路由
///
/// 除 `/api/health`、登录和注销外，`/api/*` 都经过认证中间件。
pub fn build_router(state: WebAppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/monitors",
            get(handlers::list_monitors).post(handlers::create_monitors),
        )
        .route("/api/monitors/check-all", post(handlers::check_all_monitors))
        .route(
            "/api/monitors/{id}",
            patch(handlers::update_monitor).delete(handlers::delete_monitor),
        )
        .route("/api/monitors/{id}/toggle", patch(handlers::toggle_monitor))
        .route("/api/monitors/{id}/check", post(handlers::check_monitor))
        .route(
            "/api/settings",
            get(handlers::get_settings).patch(handlers::update_settings),
        )
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/scheduler", get(handlers::scheduler_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let public = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/login", post(handlers::api_login))
        .route("/api/logout", post(handlers::api_logout))
        .route("/", get(handlers::dashboard))
        .route("/login", post(handlers::form_login))
        .route("/logout", post(handlers::form_logout));

    let cors = cors_layer(&state.config);

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS 配置：`*` 表示允许任意来源，否则只允许列出的来源并携带凭据
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("忽略无效的 CORS 来源: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_variants() {
        let permissive = ServerConfig::default();
        let _ = cors_layer(&permissive);

        let restricted = ServerConfig {
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "bad\norigin".to_string(),
            ],
            ..ServerConfig::default()
        };
        let _ = cors_layer(&restricted);
    }
}
