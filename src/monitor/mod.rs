//! 监控项模块
//!
//! 监控项数据模型以及供REST API和命令行共用的增删改查服务

pub mod model;
pub mod service;

pub use model::{
    derive_name, normalize_url, LatencyPoint, Monitor, MonitorStatus, Settings, Stats,
    DEFAULT_GLOBAL_INTERVAL_SECONDS, MAX_HISTORY, MAX_INTERVAL_SECONDS, MIN_INTERVAL_SECONDS,
};
pub use service::MonitorService;
