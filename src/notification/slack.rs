//! Slack通知发送器模块
//!
//! 通过 Incoming Webhook 发送状态变化消息

use crate::monitor::Monitor;
use crate::notification::sender::{NotificationMessage, NotificationSender, StatusChange};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

/// Slack通知发送器
pub struct SlackSender {
    /// HTTP客户端
    client: Client,
    /// webhook URL
    webhook_url: String,
}

impl SlackSender {
    /// 创建新的Slack发送器
    ///
    /// # 参数
    /// * `webhook_url` - Slack Incoming Webhook 地址
    ///
    /// # 返回
    /// * `Result<Self>` - 发送器实例
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("创建HTTP客户端失败")?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// 构建Slack消息体
    pub fn build_message_body(&self, monitor: &Monitor, message: &NotificationMessage) -> Value {
        let (emoji, color, status_text) = match message.change {
            StatusChange::Alert => ("🔴", "#ff0000", "is DOWN"),
            StatusChange::Recovery => ("🟢", "#00ff00", "is back UP"),
        };

        let status_code = match monitor.status_code {
            Some(code) if code != 0 => code.to_string(),
            _ => "N/A".to_string(),
        };
        let time = monitor
            .last_checked
            .and_then(chrono::DateTime::from_timestamp_millis)
            .unwrap_or_else(chrono::Utc::now)
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string();

        json!({
            "text": format!("{} Monitor Alert: {} {}", emoji, monitor.name, status_text),
            "blocks": [
                {
                    "type": "section",
                    "text": {
                        "type": "mrkdwn",
                        "text": format!("{} *{}* {}\n{}", emoji, monitor.name, status_text, message.content)
                    }
                },
                {
                    "type": "section",
                    "fields": [
                        { "type": "mrkdwn", "text": format!("*URL:*\n{}", monitor.url) },
                        { "type": "mrkdwn", "text": format!("*Status Code:*\n{}", status_code) },
                        { "type": "mrkdwn", "text": format!("*Latency:*\n{}ms", monitor.latency.unwrap_or(0)) },
                        { "type": "mrkdwn", "text": format!("*Time:*\n{}", time) }
                    ]
                }
            ],
            "attachments": [
                {
                    "color": color,
                    "footer": "Uptime Sentinel"
                }
            ]
        })
    }

    /// 发送消息到Slack
    async fn send_to_webhook(&self, body: &Value) -> Result<()> {
        debug!("发送消息到Slack webhook");

        let response = self
            .client
            .post(&self.webhook_url)
            .json(body)
            .send()
            .await
            .context("发送Slack消息失败")?;

        if response.status().is_success() {
            info!("Slack消息发送成功");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("Slack消息发送失败: {} - {}", status, text);
            Err(anyhow::anyhow!("Slack消息发送失败: {}", status))
        }
    }
}

#[async_trait]
impl NotificationSender for SlackSender {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, monitor: &Monitor, message: &NotificationMessage) -> Result<()> {
        let body = self.build_message_body(monitor, message);
        self.send_to_webhook(&body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::result::CheckResult;
    use crate::monitor::MonitorStatus;

    fn down_monitor() -> Monitor {
        let mut monitor = Monitor::new("example.com", None, 0);
        monitor.record_check(
            &CheckResult::new(MonitorStatus::Down, 1_700_000_000_000)
                .with_status_code(502)
                .with_latency(310),
        );
        monitor
    }

    fn alert() -> NotificationMessage {
        NotificationMessage {
            title: "🔴 example.com is DOWN".to_string(),
            content: "example.com is DOWN! Status: 502".to_string(),
            change: StatusChange::Alert,
        }
    }

    #[test]
    fn test_build_message_body() {
        let sender = SlackSender::new("http://localhost/hook".to_string()).unwrap();
        let body = sender.build_message_body(&down_monitor(), &alert());

        assert_eq!(body["text"], "🔴 Monitor Alert: example.com is DOWN");
        assert_eq!(body["attachments"][0]["color"], "#ff0000");
        assert_eq!(body["attachments"][0]["footer"], "Uptime Sentinel");
        let fields = body["blocks"][1]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0]["text"], "*URL:*\nhttps://example.com");
        assert_eq!(fields[1]["text"], "*Status Code:*\n502");
        assert_eq!(fields[2]["text"], "*Latency:*\n310ms");
    }

    #[test]
    fn test_network_failure_shows_na_status_code() {
        let sender = SlackSender::new("http://localhost/hook".to_string()).unwrap();
        let mut monitor = down_monitor();
        monitor.status_code = Some(0);
        let body = sender.build_message_body(&monitor, &alert());
        assert_eq!(body["blocks"][1]["fields"][1]["text"], "*Status Code:*\nN/A");
    }

    #[tokio::test]
    async fn test_send_posts_to_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Regex("#ff0000".to_string()))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let sender = SlackSender::new(format!("{}/hook", server.url())).unwrap();
        sender.send(&down_monitor(), &alert()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_response_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let sender = SlackSender::new(format!("{}/hook", server.url())).unwrap();
        assert!(sender.send(&down_monitor(), &alert()).await.is_err());
    }
}
