//! 监控项数据模型
//!
//! 定义监控项、延迟历史点、全局设置和汇总统计

use crate::health::result::CheckResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use uuid::Uuid;

/// 每个监控项保留的历史点数量上限
pub const MAX_HISTORY: usize = 30;

/// 检测间隔下限（秒）
pub const MIN_INTERVAL_SECONDS: u64 = 10;

/// 检测间隔上限（秒），换算成毫秒后仍能用 i64 表示
pub const MAX_INTERVAL_SECONDS: u64 = (i64::MAX / 1000) as u64;

/// 未存储设置时的默认全局检测间隔（秒）
pub const DEFAULT_GLOBAL_INTERVAL_SECONDS: u64 = 3600;

/// 监控状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    /// 站点可达
    Up,
    /// 站点不可达或返回错误状态码
    Down,
    /// 等待下一次检测
    Pending,
    /// 已暂停
    Paused,
}

impl MonitorStatus {
    /// 状态的线上表示（与JSON一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Up => "UP",
            MonitorStatus::Down => "DOWN",
            MonitorStatus::Pending => "PENDING",
            MonitorStatus::Paused => "PAUSED",
        }
    }

    /// 是否为检测得出的确定状态
    pub fn is_settled(&self) -> bool {
        matches!(self, MonitorStatus::Up | MonitorStatus::Down)
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Ok(MonitorStatus::Up),
            "DOWN" => Ok(MonitorStatus::Down),
            "PENDING" => Ok(MonitorStatus::Pending),
            "PAUSED" => Ok(MonitorStatus::Paused),
            other => Err(format!("未知的监控状态: {other}")),
        }
    }
}

/// 延迟历史点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyPoint {
    /// 检测时间（毫秒时间戳）
    pub timestamp: i64,
    /// 延迟（毫秒）
    pub latency: u64,
}

/// 监控项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub id: String,
    pub url: String,
    pub name: String,
    pub status: MonitorStatus,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub last_checked: Option<i64>,
    #[serde(default)]
    pub latency: Option<u64>,
    #[serde(default)]
    pub history: VecDeque<LatencyPoint>,
    /// 单独的检测间隔（秒），为空时跟随全局设置
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub created_at: i64,
}

impl Monitor {
    /// 根据用户输入创建新的监控项
    ///
    /// # 参数
    /// * `raw_url` - 用户输入的URL，缺少协议时自动补全 `https://`
    /// * `interval` - 单独的检测间隔
    /// * `now_ms` - 创建时间
    pub fn new(raw_url: &str, interval: Option<u64>, now_ms: i64) -> Self {
        let url = normalize_url(raw_url);
        let name = derive_name(&url);
        Self {
            id: Uuid::new_v4().to_string(),
            url,
            name,
            status: MonitorStatus::Pending,
            status_code: None,
            last_checked: None,
            latency: None,
            history: VecDeque::new(),
            interval,
            is_paused: false,
            created_at: now_ms,
        }
    }

    /// 实际生效的检测间隔（秒）
    pub fn effective_interval(&self, global_interval: u64) -> u64 {
        self.interval.unwrap_or(global_interval)
    }

    /// 判断监控项在 `now_ms` 时刻是否到期
    ///
    /// 暂停的监控项永远不会到期；PENDING 或从未检测过的立即到期。
    pub fn is_due(&self, now_ms: i64, global_interval: u64) -> bool {
        if self.is_paused {
            return false;
        }
        if self.status == MonitorStatus::Pending {
            return true;
        }
        match self.last_checked {
            None => true,
            Some(last) => {
                let interval_ms = i64::try_from(self.effective_interval(global_interval))
                    .ok()
                    .and_then(|secs| secs.checked_mul(1000));
                match interval_ms {
                    Some(interval_ms) => now_ms.saturating_sub(last) >= interval_ms,
                    // 溢出的间隔视为永不到期
                    None => false,
                }
            }
        }
    }

    /// 写入一次检测结果并追加历史点
    pub fn record_check(&mut self, result: &CheckResult) {
        if !self.is_paused {
            self.status = result.status;
        }
        self.status_code = Some(result.status_code);
        self.latency = Some(result.latency_ms);
        self.last_checked = Some(result.checked_at);

        self.history.push_back(LatencyPoint {
            timestamp: result.checked_at,
            latency: result.latency_ms,
        });
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// 标记为等待检测（暂停状态保持不变）
    pub fn mark_pending(&mut self) {
        if !self.is_paused {
            self.status = MonitorStatus::Pending;
        }
    }

    /// 切换暂停状态
    pub fn toggle_pause(&mut self) {
        self.is_paused = !self.is_paused;
        self.status = if self.is_paused {
            MonitorStatus::Paused
        } else {
            MonitorStatus::Pending
        };
    }

    /// 修改URL，名称随之重新推导
    pub fn set_url(&mut self, raw_url: &str) {
        self.url = normalize_url(raw_url);
        self.name = derive_name(&self.url);
        self.mark_pending();
    }
}

/// 去掉 `http://` 或 `https://` 前缀（不区分大小写）
fn strip_scheme(url: &str) -> Option<&str> {
    ["https://", "http://"].iter().find_map(|scheme| {
        let head = url.get(..scheme.len())?;
        head.eq_ignore_ascii_case(scheme)
            .then(|| &url[scheme.len()..])
    })
}

/// 补全URL协议
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if strip_scheme(trimmed).is_some() {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// 从URL推导显示名称：去掉协议后截取到第一个 `/`
pub fn derive_name(url: &str) -> String {
    let without_scheme = strip_scheme(url).unwrap_or(url);
    without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// 全局设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 全局检测间隔（秒）
    pub global_interval: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_interval: DEFAULT_GLOBAL_INTERVAL_SECONDS,
        }
    }
}

impl Settings {
    /// 校验间隔是否满足下限
    pub fn validate_interval(interval: u64) -> Result<(), String> {
        if interval < MIN_INTERVAL_SECONDS {
            return Err(format!(
                "Invalid interval (must be >= {} seconds)",
                MIN_INTERVAL_SECONDS
            ));
        }
        if interval > MAX_INTERVAL_SECONDS {
            return Err(format!(
                "Invalid interval (must be <= {} seconds)",
                MAX_INTERVAL_SECONDS
            ));
        }
        Ok(())
    }
}

/// 仪表盘汇总统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub up: usize,
    pub down: usize,
    pub paused: usize,
    pub avg_latency: u64,
}

impl Stats {
    /// 从监控项列表计算统计
    pub fn from_monitors(monitors: &[Monitor]) -> Self {
        let mut stats = Stats {
            total: monitors.len(),
            ..Default::default()
        };

        let mut latency_sum = 0u64;
        let mut latency_count = 0u64;

        for monitor in monitors {
            match monitor.status {
                MonitorStatus::Up => stats.up += 1,
                MonitorStatus::Down => stats.down += 1,
                _ => {}
            }
            if monitor.is_paused || monitor.status == MonitorStatus::Paused {
                stats.paused += 1;
                continue;
            }
            if monitor.status == MonitorStatus::Pending {
                continue;
            }
            latency_sum += monitor.latency.unwrap_or(0);
            latency_count += 1;
        }

        if latency_count > 0 {
            stats.avg_latency = (latency_sum as f64 / latency_count as f64).round() as u64;
        }
        stats
    }
}
