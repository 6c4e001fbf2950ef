//! Uptime Sentinel 主程序入口
//!
//! 网站可用性监控工具

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uptime_sentinel::cli::args::{Args, Commands};
use uptime_sentinel::cli::commands::{
    CheckCommand, Command, InitCommand, TestNotificationCommand, ValidateCommand, VersionCommand,
};
use uptime_sentinel::config::{self, validate_config, TomlConfigLoader};
use uptime_sentinel::health::{CheckScheduler, HttpHealthChecker};
use uptime_sentinel::logging::{LogConfig, LoggingSystem};
use uptime_sentinel::monitor::MonitorService;
use uptime_sentinel::notification::NotificationDispatcher;
use uptime_sentinel::storage::open_store;
use uptime_sentinel::web::{AuthGate, WebAppState, WebServer};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    let outcome = match &args.command {
        Commands::Serve { .. } => execute_serve_command(&args).await,
        _ => {
            init_logging(&args, "info")?;
            execute_command(&args).await
        }
    };

    if let Err(e) = outcome {
        error!("命令执行失败: {:#}", e);
        eprintln!("错误: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

/// 初始化日志系统，命令行参数优先于配置文件
fn init_logging(args: &Args, config_level: &str) -> Result<LoggingSystem> {
    let level = args
        .log_level
        .map(|l| l.to_string())
        .unwrap_or_else(|| config_level.to_string());
    let log_config = LogConfig {
        json_format: args.json_logs,
        ..LogConfig::from_level_str(&level)
    };
    LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")
}

/// 执行除 serve 外的CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let result = match &args.command {
        Commands::Check { .. } => CheckCommand.execute(args).await,
        Commands::Init { .. } => InitCommand.execute(args).await,
        Commands::Validate { .. } => ValidateCommand.execute(args).await,
        Commands::Version { .. } => VersionCommand.execute(args).await,
        Commands::TestNotification { .. } => TestNotificationCommand.execute(args).await,
        Commands::Serve { .. } => Ok(()),
    };
    result.map_err(|e| anyhow::anyhow!(e))
}

/// 执行 serve 命令
async fn execute_serve_command(args: &Args) -> Result<()> {
    let config = load_and_validate_config(args).await?;
    init_logging(args, &config.log_level)?;

    info!("Uptime Sentinel v{} 启动", uptime_sentinel::VERSION);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // 设置Ctrl+C信号处理
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("收到中断信号，正在停止服务...");
                let _ = shutdown_tx_clone.send(());
            }
            Err(err) => {
                error!("监听中断信号失败: {}", err);
            }
        }
    });

    start_service_main(config, shutdown_tx, shutdown_rx).await
}

/// 加载配置文件并应用命令行参数覆盖
///
/// 配置文件不存在时使用默认配置。
async fn load_and_validate_config(args: &Args) -> Result<config::Config> {
    let config_path = args.get_config_path();
    let (mut config, from_file) = TomlConfigLoader::new(true)
        .load_or_default(&config_path)
        .await
        .with_context(|| format!("加载配置文件失败: {}", config_path.display()))?;

    if let Commands::Serve {
        port,
        bind,
        storage,
        data,
        max_concurrent,
    } = &args.command
    {
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(bind) = bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(storage) = storage {
            config.storage.backend = *storage;
        }
        if let Some(data) = data {
            config.storage.path = data.clone();
        }
        if let Some(max_concurrent) = max_concurrent {
            config.scheduler.max_concurrent_checks = *max_concurrent;
        }
    }

    validate_config(&config)
        .map_err(|e| anyhow::anyhow!(e))
        .context("配置验证失败")?;

    if !from_file {
        eprintln!(
            "未找到配置文件 {}，使用默认配置。运行 'uptime-sentinel init' 可生成配置文件",
            config_path.display()
        );
    }
    Ok(config)
}

/// 服务组件集合
struct ServiceComponents {
    /// 检测调度器
    scheduler: Arc<CheckScheduler>,
    /// 监控项服务
    service: MonitorService,
}

/// 初始化核心服务组件
///
/// 创建存储、健康检测器、通知分发器和检测调度器。
fn initialize_service_components(config: &config::Config) -> Result<ServiceComponents> {
    let store = open_store(&config.storage).context("打开存储失败")?;

    let checker = Arc::new(
        HttpHealthChecker::new(Duration::from_secs(
            config.scheduler.request_timeout_seconds,
        ))
        .context("创建HTTP健康检测器失败")?,
    );

    let notifier = Arc::new(
        NotificationDispatcher::from_config(&config.notification)
            .context("创建通知分发器失败")?,
    );

    let scheduler = Arc::new(CheckScheduler::new(
        store.clone(),
        checker,
        notifier,
        config.scheduler.clone(),
    ));
    let service = MonitorService::new(store, scheduler.clone());

    Ok(ServiceComponents { scheduler, service })
}

/// 服务主逻辑
async fn start_service_main(
    config: config::Config,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let components = initialize_service_components(&config)?;

    // 启动调度器
    let scheduler_handle = tokio::spawn(
        components
            .scheduler
            .clone()
            .run(shutdown_tx.subscribe()),
    );

    // 启动Web服务器，直到收到关闭信号
    let state = WebAppState::new(
        components.service,
        config.server.clone(),
        AuthGate::from_password(config.auth.password.as_deref()),
    );
    let web_result = WebServer::new(state).start(shutdown_rx).await;

    // Web服务器提前退出时同样停止调度器
    let _ = shutdown_tx.send(());
    if let Err(e) = scheduler_handle.await {
        warn!("等待调度器退出失败: {}", e);
    }

    web_result.context("Web服务器运行失败")?;
    info!("服务已停止");
    Ok(())
}
