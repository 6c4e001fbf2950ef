//! 通知分发模块
//!
//! 渲染消息并投递到所有已配置的发送器。投递在后台任务中进行，
//! 失败只记录日志和计数。

use crate::config::NotificationConfig;
use crate::monitor::Monitor;
use crate::notification::sender::{
    LogSender, NotificationMessage, NotificationSender, StatusChange,
};
use crate::notification::slack::SlackSender;
use crate::notification::template::{
    default_alert_template, default_recovery_template, HandlebarsTemplate, MessageTemplate,
    TemplateContext,
};
use anyhow::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Default)]
struct NotificationCounters {
    sent: AtomicU64,
    failed: AtomicU64,
}

/// 通知统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    /// 成功发送次数
    pub sent: u64,
    /// 发送失败次数
    pub failed: u64,
}

/// 通知分发器
pub struct NotificationDispatcher {
    senders: Vec<Arc<dyn NotificationSender>>,
    alert_template: HandlebarsTemplate,
    recovery_template: HandlebarsTemplate,
    counters: Arc<NotificationCounters>,
}

impl NotificationDispatcher {
    /// 使用默认模板创建分发器
    pub fn new(senders: Vec<Arc<dyn NotificationSender>>) -> Result<Self> {
        Self::with_templates(
            senders,
            &default_alert_template(),
            &default_recovery_template(),
        )
    }

    /// 使用自定义模板创建分发器
    ///
    /// # 参数
    /// * `senders` - 发送器列表
    /// * `alert_template` - 告警模板
    /// * `recovery_template` - 恢复模板
    pub fn with_templates(
        senders: Vec<Arc<dyn NotificationSender>>,
        alert_template: &str,
        recovery_template: &str,
    ) -> Result<Self> {
        Ok(Self {
            senders,
            alert_template: HandlebarsTemplate::new(alert_template)?,
            recovery_template: HandlebarsTemplate::new(recovery_template)?,
            counters: Arc::new(NotificationCounters::default()),
        })
    }

    /// 根据配置创建分发器
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let mut senders: Vec<Arc<dyn NotificationSender>> = Vec::new();
        if config.console {
            senders.push(Arc::new(LogSender));
        }
        if let Some(webhook_url) = &config.slack_webhook_url {
            senders.push(Arc::new(SlackSender::new(webhook_url.clone())?));
        }

        let alert = config
            .alert_template
            .clone()
            .unwrap_or_else(default_alert_template);
        let recovery = config
            .recovery_template
            .clone()
            .unwrap_or_else(default_recovery_template);

        let dispatcher = Self::with_templates(senders, &alert, &recovery)?;
        debug!("通知发送器: {:?}", dispatcher.sender_names());
        Ok(dispatcher)
    }

    /// 已配置的发送器名称
    pub fn sender_names(&self) -> Vec<&'static str> {
        self.senders.iter().map(|s| s.name()).collect()
    }

    /// 渲染通知消息，模板失败时退回到标题
    pub fn build_message(
        &self,
        monitor: &Monitor,
        change: StatusChange,
        error_message: Option<String>,
    ) -> NotificationMessage {
        let context = TemplateContext::from_monitor(monitor, error_message);
        let template = match change {
            StatusChange::Alert => &self.alert_template,
            StatusChange::Recovery => &self.recovery_template,
        };
        let title = NotificationMessage::default_title(monitor, change);
        let content = template.render(&context).unwrap_or_else(|e| {
            error!("通知模板渲染失败: {:#}", e);
            title.clone()
        });

        NotificationMessage {
            title,
            content,
            change,
        }
    }

    /// 在后台投递状态变化通知，不阻塞调用方
    pub fn notify(&self, monitor: &Monitor, change: StatusChange, error_message: Option<String>) {
        if self.senders.is_empty() {
            return;
        }
        let message = self.build_message(monitor, change, error_message);
        let senders = self.senders.clone();
        let counters = Arc::clone(&self.counters);
        let monitor = monitor.clone();

        tokio::spawn(async move {
            deliver_all(&senders, &counters, &monitor, &message).await;
        });
    }

    /// 等待所有发送器完成投递
    ///
    /// # 返回
    /// * `NotificationStats` - 本次投递的成功/失败次数
    pub async fn deliver(
        &self,
        monitor: &Monitor,
        message: &NotificationMessage,
    ) -> NotificationStats {
        deliver_all(&self.senders, &self.counters, monitor, message).await
    }

    /// 累计统计
    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn deliver_all(
    senders: &[Arc<dyn NotificationSender>],
    counters: &NotificationCounters,
    monitor: &Monitor,
    message: &NotificationMessage,
) -> NotificationStats {
    let results = futures::future::join_all(
        senders
            .iter()
            .map(|sender| async move { (sender.name(), sender.send(monitor, message).await) }),
    )
    .await;

    let mut stats = NotificationStats::default();
    for (name, result) in results {
        match result {
            Ok(()) => {
                stats.sent += 1;
                counters.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failed += 1;
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(sender = name, monitor = %monitor.name, "通知发送失败: {:#}", e);
            }
        }
    }
    stats
}
