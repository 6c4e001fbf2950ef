//! 命令处理逻辑
//!
//! 实现除 `serve` 之外各个CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, NotificationKind, OutputFormat};
use crate::config::{ConfigLoader, TomlConfigLoader};
use crate::error::{Result, SentinelError};
use crate::health::{CheckResult, HealthChecker, HttpHealthChecker};
use crate::monitor::{derive_name, normalize_url, Monitor, MonitorStatus};
use crate::notification::{NotificationDispatcher, StatusChange};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// 默认配置文件内容
const DEFAULT_CONFIG: &str = include_str!("../../config.example.toml");

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                _ => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    ///
    /// # 返回
    /// * `Result<()>` - 文件已存在且未指定 `force` 时不做任何修改
    pub async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(config_path, DEFAULT_CONFIG).await?;

        println!("配置文件已创建: {}", config_path.display());
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let path = config_path.clone().unwrap_or_else(|| args.get_config_path());
            println!("验证配置文件: {}", path.display());

            let config = TomlConfigLoader::new(true).load_from_file(&path).await?;

            println!("✓ 配置文件验证通过");
            if *verbose {
                println!("Web服务: {}:{}", config.server.bind_address, config.server.port);
                println!("  扫描间隔: {}秒", config.scheduler.tick_interval_seconds);
                println!("  请求超时: {}秒", config.scheduler.request_timeout_seconds);
                println!("  最大并发: {}", config.scheduler.max_concurrent_checks);
                println!(
                    "  默认全局间隔: {}秒",
                    config.scheduler.default_global_interval_seconds
                );
                println!(
                    "存储: {:?} ({})",
                    config.storage.backend,
                    config.storage.path.display()
                );
                println!(
                    "Slack通知: {}",
                    if config.notification.slack_webhook_url.is_some() {
                        "已配置"
                    } else {
                        "未配置"
                    }
                );
                println!(
                    "访问密码: {}",
                    if config.auth.password.is_some() {
                        "已启用"
                    } else {
                        "未启用"
                    }
                );
            }
        }
        Ok(())
    }
}

/// 一次性检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Check {
            urls,
            format,
            timeout,
        } = &args.command
        {
            let checker = HttpHealthChecker::new(Duration::from_secs(*timeout))?;
            let results = self.check_urls(&checker, urls).await;
            self.print_results(&results, format)?;

            let down = results
                .iter()
                .filter(|(_, r)| r.status == MonitorStatus::Down)
                .count();
            if down > 0 {
                return Err(SentinelError::Other(anyhow::anyhow!(
                    "{} 个URL不可用",
                    down
                )));
            }
        }
        Ok(())
    }
}

impl CheckCommand {
    /// 并发检测所有URL
    pub async fn check_urls(
        &self,
        checker: &dyn HealthChecker,
        urls: &[String],
    ) -> Vec<(String, CheckResult)> {
        let normalized: Vec<String> = urls.iter().map(|u| normalize_url(u)).collect();
        let results =
            futures::future::join_all(normalized.iter().map(|url| checker.check(url))).await;
        normalized.into_iter().zip(results).collect()
    }

    fn print_results(
        &self,
        results: &[(String, CheckResult)],
        format: &OutputFormat,
    ) -> Result<()> {
        match format {
            OutputFormat::Json => {
                let json_results: Vec<_> = results
                    .iter()
                    .map(|(url, result)| {
                        serde_json::json!({
                            "url": url,
                            "name": derive_name(url),
                            "result": result,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json_results)?);
            }
            OutputFormat::Table => {
                println!(
                    "{:<32} {:<8} {:<6} {:<10} {}",
                    "名称", "状态", "状态码", "延迟", "错误"
                );
                println!("{}", "-".repeat(85));
                for (url, result) in results {
                    println!(
                        "{:<32} {:<8} {:<6} {:<10} {}",
                        derive_name(url),
                        result.status,
                        result.status_code,
                        format!("{}ms", result.latency_ms),
                        result.error_message.as_deref().unwrap_or("-")
                    );
                }
            }
            OutputFormat::Text => {
                for (url, result) in results {
                    let icon = if result.is_up() { "✓" } else { "✗" };
                    println!(
                        "{} {} - {} (状态码: {}, 延迟: {}ms)",
                        icon, url, result.status, result.status_code, result.latency_ms
                    );
                    if let Some(error) = &result.error_message {
                        println!("  错误: {error}");
                    }
                }
            }
        }
        Ok(())
    }
}

/// 测试通知命令
pub struct TestNotificationCommand;

#[async_trait]
impl Command for TestNotificationCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::TestNotification { kind, url } = &args.command {
            let (config, _) = TomlConfigLoader::new(true)
                .load_or_default(args.get_config_path())
                .await?;
            let dispatcher = NotificationDispatcher::from_config(&config.notification)?;

            if dispatcher.sender_names().is_empty() {
                println!("❌ 未配置任何通知发送器");
                println!("请在配置文件中设置 notification.console 或 notification.slack_webhook_url");
                return Ok(());
            }

            let change = match kind {
                NotificationKind::Alert => StatusChange::Alert,
                NotificationKind::Recovery => StatusChange::Recovery,
            };
            let monitor = sample_monitor(url, change);
            let error_message = (change == StatusChange::Alert)
                .then(|| "Connection refused (test notification)".to_string());
            let message = dispatcher.build_message(&monitor, change, error_message);

            println!("📤 发送测试消息: {}", message.title);
            let stats = dispatcher.deliver(&monitor, &message).await;
            println!("发送器: {:?}", dispatcher.sender_names());
            println!("成功: {}，失败: {}", stats.sent, stats.failed);

            if stats.failed > 0 {
                return Err(SentinelError::Other(anyhow::anyhow!(
                    "{} 个通知发送失败",
                    stats.failed
                )));
            }
        }
        Ok(())
    }
}

/// 构造一个处于目标状态的示例监控项
fn sample_monitor(url: &str, change: StatusChange) -> Monitor {
    let now = chrono::Utc::now().timestamp_millis();
    let mut monitor = Monitor::new(url, None, now);
    let result = match change {
        StatusChange::Alert => CheckResult::network_failure("Connection refused".to_string(), now),
        StatusChange::Recovery => CheckResult::new(MonitorStatus::Up, now)
            .with_status_code(200)
            .with_latency(120),
    };
    monitor.record_check(&result);
    monitor
}
