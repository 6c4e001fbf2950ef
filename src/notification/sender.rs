//! 通知发送器模块
//!
//! 定义通知发送的trait和基础实现

use crate::monitor::{Monitor, MonitorStatus};
use anyhow::Result;
use async_trait::async_trait;

/// 状态变化类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// UP → DOWN
    Alert,
    /// DOWN → UP
    Recovery,
}

impl StatusChange {
    /// 根据上一次确定状态和本次状态判断是否需要通知
    ///
    /// 只有 UP 与 DOWN 之间的切换才会产生通知。
    pub fn between(previous: MonitorStatus, current: MonitorStatus) -> Option<Self> {
        match (previous, current) {
            (MonitorStatus::Up, MonitorStatus::Down) => Some(StatusChange::Alert),
            (MonitorStatus::Down, MonitorStatus::Up) => Some(StatusChange::Recovery),
            _ => None,
        }
    }

    /// 变化后的状态
    pub fn new_status(&self) -> MonitorStatus {
        match self {
            StatusChange::Alert => MonitorStatus::Down,
            StatusChange::Recovery => MonitorStatus::Up,
        }
    }
}

/// 通知消息结构
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    /// 消息标题
    pub title: String,
    /// 消息内容
    pub content: String,
    /// 变化类型
    pub change: StatusChange,
}

impl NotificationMessage {
    /// 默认标题
    pub fn default_title(monitor: &Monitor, change: StatusChange) -> String {
        match change {
            StatusChange::Alert => format!("🔴 {} is DOWN", monitor.name),
            StatusChange::Recovery => format!("🟢 {} is back UP", monitor.name),
        }
    }
}

/// 通知发送器trait
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 发送器名称，用于日志
    fn name(&self) -> &'static str;

    /// 发送一次状态变化通知
    ///
    /// # 参数
    /// * `monitor` - 发生变化的监控项（已写入本次结果）
    /// * `message` - 渲染好的消息
    ///
    /// # 返回
    /// * `Result<()>` - 发送结果
    async fn send(&self, monitor: &Monitor, message: &NotificationMessage) -> Result<()>;
}

/// 日志通知发送器
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, monitor: &Monitor, message: &NotificationMessage) -> Result<()> {
        match message.change {
            StatusChange::Alert => tracing::warn!(
                monitor_id = %monitor.id,
                url = %monitor.url,
                status_code = ?monitor.status_code,
                "[ALERT] {}: {}",
                message.title,
                message.content
            ),
            StatusChange::Recovery => tracing::info!(
                monitor_id = %monitor.id,
                url = %monitor.url,
                status_code = ?monitor.status_code,
                "[RECOVERY] {}: {}",
                message.title,
                message.content
            ),
        }
        Ok(())
    }
}

/// 空的通知发送器实现（用于测试或禁用通知）
pub struct NoOpSender;

#[async_trait]
impl NotificationSender for NoOpSender {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn send(&self, _monitor: &Monitor, _message: &NotificationMessage) -> Result<()> {
        Ok(())
    }
}
