//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::monitor::{
    DEFAULT_GLOBAL_INTERVAL_SECONDS, MAX_INTERVAL_SECONDS, MIN_INTERVAL_SECONDS,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Web 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 调度器配置
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 通知配置
    #[serde(default)]
    pub notification: NotificationConfig,
    /// 访问密码配置
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Web 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 允许跨域的来源，`*` 表示任意来源
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// 仪表盘自动刷新间隔（秒）
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u32,
}

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// 扫描间隔（秒，1-10）
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// 单次检测超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// 最大并发检测数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_checks: usize,
    /// 未存储设置时的全局检测间隔（秒）
    #[serde(default = "default_global_interval")]
    pub default_global_interval_seconds: u64,
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 进程内存
    Memory,
    /// JSON文件
    #[default]
    Json,
    /// SQLite数据库
    Sqlite,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "json" => Ok(StorageBackend::Json),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!(
                "无效的存储后端: {}，支持的类型: memory, json, sqlite",
                other
            )),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// 后端类型
    #[serde(default)]
    pub backend: StorageBackend,
    /// 文件路径（json/sqlite 使用）
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

/// 通知配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    /// 是否在日志中输出告警
    #[serde(default = "default_true")]
    pub console: bool,
    /// Slack Incoming Webhook 地址
    pub slack_webhook_url: Option<String>,
    /// 告警消息模板（Handlebars）
    pub alert_template: Option<String>,
    /// 恢复消息模板（Handlebars）
    pub recovery_template: Option<String>,
}

/// 访问密码配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// 共享密码，未设置时不启用访问控制
    pub password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
            notification: NotificationConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            refresh_interval_seconds: default_refresh_interval(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_tick_interval(),
            request_timeout_seconds: default_timeout(),
            max_concurrent_checks: default_max_concurrent(),
            default_global_interval_seconds: default_global_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            console: true,
            slack_webhook_url: None,
            alert_template: None,
            recovery_template: None,
        }
    }
}

impl Config {
    /// 将空字符串视为未设置（环境变量可能被设置为空值）
    pub fn normalize(&mut self) {
        fn clear_empty(value: &mut Option<String>) {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        clear_empty(&mut self.notification.slack_webhook_url);
        clear_empty(&mut self.notification.alert_template);
        clear_empty(&mut self.notification.recovery_template);
        clear_empty(&mut self.auth.password);
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_refresh_interval() -> u32 {
    5
}
fn default_tick_interval() -> u64 {
    1
}
fn default_timeout() -> u64 {
    10
}
fn default_max_concurrent() -> usize {
    5
}
fn default_global_interval() -> u64 {
    DEFAULT_GLOBAL_INTERVAL_SECONDS
}
fn default_storage_path() -> PathBuf {
    PathBuf::from("monitors.json")
}
fn default_true() -> bool {
    true
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.log_level, valid_log_levels
        ));
    }

    // 验证Web配置
    let server = &config.server;
    if server.port == 0 {
        return Err("无效的Web服务器端口: 0，端口不能为0".to_string());
    }
    if server.bind_address.trim().is_empty() {
        return Err("Web服务器绑定地址不能为空".to_string());
    }
    if server.cors_origins.is_empty() {
        return Err("cors_origins 至少需要一个来源".to_string());
    }
    if server.refresh_interval_seconds == 0 || server.refresh_interval_seconds > 300 {
        return Err("仪表盘刷新间隔必须在1到300秒之间".to_string());
    }

    // 验证调度器配置
    let scheduler = &config.scheduler;
    if !(1..=10).contains(&scheduler.tick_interval_seconds) {
        return Err(format!(
            "扫描间隔必须在1到10秒之间，当前为: {}",
            scheduler.tick_interval_seconds
        ));
    }
    if scheduler.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }
    if scheduler.max_concurrent_checks == 0 {
        return Err("最大并发检测数不能为0".to_string());
    }
    if scheduler.default_global_interval_seconds < MIN_INTERVAL_SECONDS {
        return Err(format!(
            "默认全局检测间隔不能小于{}秒",
            MIN_INTERVAL_SECONDS
        ));
    }
    if scheduler.default_global_interval_seconds > MAX_INTERVAL_SECONDS {
        return Err(format!(
            "默认全局检测间隔不能大于{}秒",
            MAX_INTERVAL_SECONDS
        ));
    }

    // 验证存储配置
    if config.storage.backend != StorageBackend::Memory
        && config.storage.path.as_os_str().is_empty()
    {
        return Err("存储文件路径不能为空".to_string());
    }

    // 验证通知配置
    if let Some(url) = &config.notification.slack_webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err("Slack webhook URL格式无效".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.cors_origins, vec!["*"]);
        assert_eq!(config.scheduler.tick_interval_seconds, 1);
        assert_eq!(config.scheduler.request_timeout_seconds, 10);
        assert_eq!(config.scheduler.max_concurrent_checks, 5);
        assert_eq!(config.scheduler.default_global_interval_seconds, 3600);
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert!(config.notification.console);
        assert!(config.auth.password.is_none());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config {
            log_level: "debug".to_string(),
            ..Default::default()
        };
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = PathBuf::from("data/sentinel.db");

        let serialized = toml::to_string(&config).expect("序列化失败");
        assert!(serialized.contains("backend = \"sqlite\""));

        let deserialized: Config = toml::from_str(&serialized).expect("反序列化失败");
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_validation_tick_interval_range() {
        let mut config = Config::default();
        config.scheduler.tick_interval_seconds = 11;

        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("扫描间隔"));
    }

    #[test]
    fn test_validation_global_interval_lower_bound() {
        let mut config = Config::default();
        config.scheduler.default_global_interval_seconds = 5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_global_interval_upper_bound() {
        let mut config = Config::default();
        config.scheduler.default_global_interval_seconds = u64::MAX;
        assert!(validate_config(&config).unwrap_err().contains("不能大于"));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        assert!(validate_config(&config).unwrap_err().contains("日志级别"));
    }

    #[test]
    fn test_normalize_clears_empty_strings() {
        let mut config = Config::default();
        config.auth.password = Some("   ".to_string());
        config.notification.slack_webhook_url = Some(String::new());
        config.normalize();
        assert!(config.auth.password.is_none());
        assert!(config.notification.slack_webhook_url.is_none());
    }

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("SQLite".parse::<StorageBackend>(), Ok(StorageBackend::Sqlite));
        assert!("redis".parse::<StorageBackend>().is_err());
    }
}
