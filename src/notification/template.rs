//! 消息模板模块
//!
//! 使用Handlebars渲染通知内容

use crate::monitor::Monitor;
use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

const TEMPLATE_NAME: &str = "message";

/// 模板上下文数据
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// 监控项名称
    pub name: String,
    /// 监控URL
    pub url: String,
    /// 当前状态
    pub status: String,
    /// HTTP状态码
    pub status_code: Option<u16>,
    /// 延迟（毫秒）
    pub latency: u64,
    /// 时间戳
    pub timestamp: String,
    /// 错误信息
    pub error_message: Option<String>,
}

impl TemplateContext {
    /// 从已写入检测结果的监控项构建上下文
    pub fn from_monitor(monitor: &Monitor, error_message: Option<String>) -> Self {
        let timestamp = monitor
            .last_checked
            .and_then(chrono::DateTime::from_timestamp_millis)
            .unwrap_or_else(chrono::Utc::now)
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string();

        Self {
            name: monitor.name.clone(),
            url: monitor.url.clone(),
            status: monitor.status.to_string(),
            status_code: monitor.status_code,
            latency: monitor.latency.unwrap_or(0),
            timestamp,
            error_message,
        }
    }
}

/// 消息模板trait
pub trait MessageTemplate: Send + Sync {
    /// 渲染模板
    ///
    /// # 参数
    /// * `context` - 模板上下文
    ///
    /// # 返回
    /// * `Result<String>` - 渲染后的消息
    fn render(&self, context: &TemplateContext) -> Result<String>;
}

/// Handlebars模板
pub struct HandlebarsTemplate {
    registry: Handlebars<'static>,
}

impl HandlebarsTemplate {
    /// 创建新的Handlebars模板，创建时即校验语法
    ///
    /// # 参数
    /// * `template` - 模板字符串
    ///
    /// # 返回
    /// * `Result<Self>` - 模板实例
    pub fn new(template: &str) -> Result<Self> {
        let mut registry = Handlebars::new();
        // 通知是纯文本，不做HTML转义
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, template)
            .context("模板语法错误")?;
        Ok(Self { registry })
    }
}

impl MessageTemplate for HandlebarsTemplate {
    fn render(&self, context: &TemplateContext) -> Result<String> {
        self.registry
            .render(TEMPLATE_NAME, context)
            .context("模板渲染失败")
    }
}

/// 默认的告警消息模板
pub fn default_alert_template() -> String {
    r#"{{name}} is DOWN! Status: {{#if status_code}}{{status_code}}{{else}}N/A{{/if}} | Latency: {{latency}}ms | URL: {{url}} | Time: {{timestamp}}{{#if error_message}} | Error: {{error_message}}{{/if}}"#
        .to_string()
}

/// 默认的恢复消息模板
pub fn default_recovery_template() -> String {
    r#"{{name}} is back UP. Status: {{#if status_code}}{{status_code}}{{else}}N/A{{/if}} | Latency: {{latency}}ms | URL: {{url}} | Time: {{timestamp}}"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContext {
        TemplateContext {
            name: "example.com".to_string(),
            url: "https://example.com".to_string(),
            status: "DOWN".to_string(),
            status_code: Some(503),
            latency: 120,
            timestamp: "2024-01-01 12:00:00 UTC".to_string(),
            error_message: Some("HTTP 503 Service Unavailable".to_string()),
        }
    }

    #[test]
    fn test_handlebars_render() {
        let template = HandlebarsTemplate::new("{{name}} -> {{status}} ({{status_code}})").unwrap();
        assert_eq!(
            template.render(&context()).unwrap(),
            "example.com -> DOWN (503)"
        );
    }

    #[test]
    fn test_default_alert_template() {
        let template = HandlebarsTemplate::new(&default_alert_template()).unwrap();
        let rendered = template.render(&context()).unwrap();
        assert!(rendered.starts_with("example.com is DOWN! Status: 503"));
        assert!(rendered.contains("Error: HTTP 503 Service Unavailable"));
    }

    #[test]
    fn test_missing_status_code_renders_na() {
        let template = HandlebarsTemplate::new(&default_recovery_template()).unwrap();
        let mut ctx = context();
        ctx.status_code = None;
        let rendered = template.render(&ctx).unwrap();
        assert!(rendered.contains("Status: N/A"));
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        assert!(HandlebarsTemplate::new("{{#if name}}unclosed").is_err());
    }
}
