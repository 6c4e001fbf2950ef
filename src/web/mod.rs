//! Web 模块
//!
//! 提供 REST API、仪表板页面和共享密码认证

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthGate;
pub use error::ApiError;
pub use server::{build_router, WebServer};

use crate::config::ServerConfig;
use crate::monitor::MonitorService;
use std::time::Instant;

/// Web 应用状态
#[derive(Clone)]
pub struct WebAppState {
    /// 监控项服务
    pub service: MonitorService,
    /// 服务器配置
    pub config: ServerConfig,
    /// 认证校验器，未配置密码时为 None
    pub auth: Option<AuthGate>,
    /// 启动时间
    pub start_time: Instant,
}

impl WebAppState {
    pub fn new(service: MonitorService, config: ServerConfig, auth: Option<AuthGate>) -> Self {
        Self {
            service,
            config,
            auth,
            start_time: Instant::now(),
        }
    }
}
