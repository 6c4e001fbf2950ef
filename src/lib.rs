//! Uptime Sentinel - 网站可用性监控工具
//!
//! 这是一个用Rust编写的网站可用性监控工具，支持：
//! - 周期性HTTP HEAD检测，带并发上限和单监控项互斥
//! - 状态变化通知（日志、Slack）
//! - REST API 和仪表板
//! - 内存、JSON文件和SQLite三种存储
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod storage;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use error::SentinelError;
pub use health::{CheckResult, CheckScheduler, HealthChecker};
pub use monitor::{Monitor, MonitorService, MonitorStatus, Settings};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
