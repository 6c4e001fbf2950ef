//! 通知模块
//!
//! 提供状态变化通知（日志、Slack）和消息模板功能

pub mod dispatcher;
pub mod sender;
pub mod slack;
pub mod template;

// 重新导出主要类型
pub use dispatcher::{NotificationDispatcher, NotificationStats};
pub use sender::{LogSender, NoOpSender, NotificationMessage, NotificationSender, StatusChange};
pub use slack::SlackSender;
pub use template::{HandlebarsTemplate, MessageTemplate, TemplateContext};
