//! 检测结果数据结构
//!
//! 定义单次HTTP探测的结果类型

use crate::monitor::MonitorStatus;
use serde::{Deserialize, Serialize};

/// 单次检测结果
///
/// 探测本身永远不会失败，网络错误、超时等都编码在结果中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// 检测得出的状态，只会是 UP 或 DOWN
    pub status: MonitorStatus,
    /// HTTP状态码，网络失败时为0
    pub status_code: u16,
    /// 延迟（毫秒），网络失败时为0
    pub latency_ms: u64,
    /// 错误信息（如果有）
    pub error_message: Option<String>,
    /// 检测完成时间（毫秒时间戳）
    pub checked_at: i64,
}

impl CheckResult {
    /// 创建新的检测结果
    ///
    /// # 参数
    /// * `status` - 检测状态
    /// * `checked_at` - 检测完成时间
    ///
    /// # 返回
    /// * `Self` - 检测结果实例
    pub fn new(status: MonitorStatus, checked_at: i64) -> Self {
        Self {
            status,
            status_code: 0,
            latency_ms: 0,
            error_message: None,
            checked_at,
        }
    }

    /// 创建网络失败结果：DOWN、状态码0、延迟0
    pub fn network_failure(error_message: String, checked_at: i64) -> Self {
        Self::new(MonitorStatus::Down, checked_at).with_error(error_message)
    }

    /// 设置HTTP状态码
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// 设置延迟
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// 设置错误信息
    pub fn with_error(mut self, error_message: String) -> Self {
        self.error_message = Some(error_message);
        self
    }

    /// 判断是否为UP
    pub fn is_up(&self) -> bool {
        self.status == MonitorStatus::Up
    }
}

/// 判断HTTP状态码是否视为可达（200-399）
pub fn is_up_status(status_code: u16) -> bool {
    (200..400).contains(&status_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failure_result() {
        let result = CheckResult::network_failure("Request timeout".to_string(), 7);
        assert_eq!(result.status, MonitorStatus::Down);
        assert_eq!(result.status_code, 0);
        assert_eq!(result.latency_ms, 0);
        assert_eq!(result.error_message.as_deref(), Some("Request timeout"));
        assert_eq!(result.checked_at, 7);
    }

    #[test]
    fn test_builder_pattern() {
        let result = CheckResult::new(MonitorStatus::Up, 1)
            .with_status_code(204)
            .with_latency(87);
        assert!(result.is_up());
        assert_eq!(result.status_code, 204);
        assert_eq!(result.latency_ms, 87);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_up_status_range() {
        assert!(is_up_status(200));
        assert!(is_up_status(301));
        assert!(is_up_status(399));
        assert!(!is_up_status(199));
        assert!(!is_up_status(404));
        assert!(!is_up_status(500));
    }
}
