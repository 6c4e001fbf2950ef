//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Uptime Sentinel 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum SentinelError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 存储相关错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    /// 监控项操作错误
    #[error("监控项错误: {0}")]
    Monitor(#[from] MonitorError),

    /// 通知相关错误
    #[error("通知错误: {0}")]
    Notification(#[from] NotificationError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// 文件读写失败
    #[error("存储文件读写失败: {0}")]
    Io(#[from] std::io::Error),

    /// 记录序列化失败
    #[error("记录序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite错误
    #[error("SQLite错误: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// 后台任务执行失败
    #[error("存储任务执行失败: {0}")]
    Task(String),

    /// 存储内容损坏
    #[error("存储内容损坏: {0}")]
    Corrupt(String),
}

/// 监控项操作错误类型
#[derive(Error, Debug)]
pub enum MonitorError {
    /// 监控项不存在
    #[error("监控项不存在: {0}")]
    NotFound(String),

    /// 输入校验失败
    #[error("{0}")]
    Validation(String),

    /// 该监控项已有检测在进行中
    #[error("监控项正在检测中: {0}")]
    CheckInProgress(String),

    /// 底层存储失败
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// 通知错误类型
#[derive(Error, Debug)]
pub enum NotificationError {
    /// 发送失败
    #[error("通知发送失败: {0}")]
    SendError(String),

    /// 模板渲染错误
    #[error("模板渲染失败: {0}")]
    TemplateError(String),

    /// 配置错误
    #[error("通知配置错误: {0}")]
    ConfigError(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_passed_through() {
        let err = MonitorError::Validation("URLs required".to_string());
        assert_eq!(err.to_string(), "URLs required");
    }

    #[test]
    fn test_storage_error_converts_into_monitor_error() {
        let err: MonitorError = StorageError::Corrupt("bad header".to_string()).into();
        assert!(matches!(err, MonitorError::Storage(_)));
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn test_config_error_wraps_into_top_level() {
        let err: SentinelError = ConfigError::EnvVarError {
            var: "SLACK_WEBHOOK_URL".to_string(),
        }
        .into();
        assert!(err.to_string().contains("SLACK_WEBHOOK_URL"));
    }
}
