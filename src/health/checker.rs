//! HTTP健康检测器实现
//!
//! 对监控URL发起HEAD请求，带超时处理

use crate::error::{Result, SentinelError};
use crate::health::result::{is_up_status, CheckResult};
use crate::monitor::MonitorStatus;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// 健康检测器trait，定义检测接口
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// 执行健康检测
    ///
    /// # 参数
    /// * `url` - 监控URL
    ///
    /// # 返回
    /// * `CheckResult` - 检测结果，失败同样编码为结果
    async fn check(&self, url: &str) -> CheckResult;

    /// 带超时的健康检测
    ///
    /// # 参数
    /// * `url` - 监控URL
    /// * `timeout_duration` - 超时时间
    async fn check_with_timeout(&self, url: &str, timeout_duration: Duration) -> CheckResult;
}

/// HTTP健康检测器实现
pub struct HttpHealthChecker {
    /// HTTP客户端
    client: Client,
    /// 默认超时时间
    default_timeout: Duration,
}

impl HttpHealthChecker {
    /// 创建新的HTTP健康检测器
    ///
    /// # 参数
    /// * `timeout` - 默认超时时间
    ///
    /// # 返回
    /// * `Result<Self>` - 检测器实例
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| SentinelError::Other(anyhow::anyhow!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// 执行单次HEAD请求
    async fn perform_request(&self, url: &str, timeout_duration: Duration) -> CheckResult {
        let start_time = Instant::now();

        let request = self.client.head(url).timeout(timeout_duration);
        let response_result = timeout(timeout_duration, request.send()).await;

        let latency_ms = start_time.elapsed().as_millis() as u64;
        let checked_at = chrono::Utc::now().timestamp_millis();

        match response_result {
            Ok(Ok(response)) => {
                let status_code = response.status().as_u16();
                let status = if is_up_status(status_code) {
                    MonitorStatus::Up
                } else {
                    MonitorStatus::Down
                };

                let mut result = CheckResult::new(status, checked_at)
                    .with_status_code(status_code)
                    .with_latency(latency_ms);

                if status == MonitorStatus::Down {
                    result = result.with_error(format!(
                        "HTTP {} {}",
                        status_code,
                        response.status().canonical_reason().unwrap_or("Unknown")
                    ));
                }
                result
            }
            Ok(Err(e)) => CheckResult::network_failure(format_request_error(&e), checked_at),
            Err(_) => CheckResult::network_failure("Request timeout".to_string(), checked_at),
        }
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self, url: &str) -> CheckResult {
        self.check_with_timeout(url, self.default_timeout).await
    }

    async fn check_with_timeout(&self, url: &str, timeout_duration: Duration) -> CheckResult {
        let result = self.perform_request(url, timeout_duration).await;
        tracing::debug!(
            url = %url,
            status = %result.status,
            status_code = result.status_code,
            latency_ms = result.latency_ms,
            "检测完成"
        );
        result
    }
}

/// 请求使用的 User-Agent
pub fn user_agent() -> String {
    format!("{}/{}", crate::APP_NAME, crate::VERSION)
}

/// 格式化请求错误信息，使其更加清晰易读
fn format_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return "Request timeout".to_string();
    }
    if error.is_builder() {
        return "Invalid URL".to_string();
    }

    // 连接错误需要看完整的错误链才能区分 DNS / TLS / 拒绝连接
    let mut chain = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }
    let lowered = chain.to_lowercase();

    if lowered.contains("dns")
        || lowered.contains("failed to lookup")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
    {
        "DNS resolution failed".to_string()
    } else if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl")
    {
        "SSL/TLS certificate error".to_string()
    } else if lowered.contains("connection refused") {
        "Connection refused".to_string()
    } else if error.is_connect() {
        "Connection failed".to_string()
    } else if error.is_request() {
        "Invalid request".to_string()
    } else {
        format!("Request failed: {}", error)
    }
}
