//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::StorageBackend;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Uptime Sentinel - 网站可用性监控工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uptime-sentinel",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "SENTINEL_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的值
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "SENTINEL_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 是否输出JSON格式日志
    #[arg(long, help = "输出JSON格式日志")]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动调度器和Web服务
    Serve {
        /// 监听端口
        #[arg(short, long, value_name = "PORT", help = "监听端口", env = "PORT")]
        port: Option<u16>,

        /// 绑定地址
        #[arg(short, long, value_name = "ADDR", help = "绑定地址")]
        bind: Option<String>,

        /// 存储后端
        #[arg(long, value_name = "BACKEND", help = "存储后端: memory, json, sqlite")]
        storage: Option<StorageBackend>,

        /// 存储文件路径
        #[arg(long, value_name = "PATH", help = "存储文件路径")]
        data: Option<PathBuf>,

        /// 最大并发检测数
        #[arg(
            long,
            value_name = "COUNT",
            help = "最大并发检测数",
            env = "SENTINEL_MAX_CONCURRENT"
        )]
        max_concurrent: Option<usize>,
    },

    /// 对URL执行一次性检测
    Check {
        /// 要检测的URL，未带协议时自动补全 https://
        #[arg(value_name = "URL", required = true, help = "要检测的URL")]
        urls: Vec<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,

        /// 超时时间（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            default_value = "10",
            help = "超时时间（秒）"
        )]
        timeout: u64,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "config.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 测试通知功能
    TestNotification {
        /// 通知类型
        #[arg(short, long, value_enum, default_value = "alert", help = "通知类型")]
        kind: NotificationKind,

        /// 示例监控项URL
        #[arg(
            short,
            long,
            default_value = "https://example.com",
            help = "示例监控项URL"
        )]
        url: String,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
    /// 表格格式
    Table,
}

/// 测试通知类型
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum NotificationKind {
    /// 下线告警
    Alert,
    /// 恢复通知
    Recovery,
}

impl Args {
    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }
}
