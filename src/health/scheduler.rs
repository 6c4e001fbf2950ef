//! 检测调度器模块
//!
//! 周期性扫描所有监控项，选出到期的监控项并发执行检测，
//! 保证同一监控项同一时刻最多只有一个检测在进行。

use crate::config::SchedulerConfig;
use crate::error::{MonitorError, StorageError};
use crate::health::{CheckResult, HealthChecker};
use crate::monitor::{Monitor, MonitorStatus};
use crate::notification::{NotificationDispatcher, StatusChange};
use crate::storage::MonitorStore;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// 时钟接口，调度器通过它获取当前时间
pub trait Clock: Send + Sync {
    /// 当前毫秒时间戳
    fn now_ms(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// 手动控制的时钟，用于测试
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// 设置当前时间
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// 时间前进
    pub fn advance(&self, delta: Duration) {
        self.now
            .fetch_add(delta.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 正在检测中的监控项集合
#[derive(Debug, Default)]
struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    /// 占用监控项，已被占用时返回 `None`
    fn try_claim(&self, id: &str) -> Option<InFlightGuard> {
        let mut ids = lock(&self.ids);
        if !ids.insert(id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            ids: Arc::clone(&self.ids),
            id: id.to_string(),
        })
    }

    fn contains(&self, id: &str) -> bool {
        lock(&self.ids).contains(id)
    }

    fn len(&self) -> usize {
        lock(&self.ids).len()
    }
}

/// 释放时自动把监控项移出检测中集合
#[derive(Debug)]
struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.ids).remove(&self.id);
    }
}

/// 一次扫描的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// 到期的监控项数量
    pub due: usize,
    /// 实际启动的检测数量
    pub started: usize,
    /// 因已在检测中而跳过的数量
    pub skipped_in_flight: usize,
}

/// 全量检测的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckAllReport {
    /// 完成并写入的检测数量
    pub checked: usize,
    /// 未暂停的监控项总数
    pub total: usize,
}

/// 调度器状态
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    /// 调度循环是否运行中
    pub is_running: bool,
    /// 已执行的扫描次数
    pub ticks: u64,
    /// 完成并写入的检测次数
    pub checks_completed: u64,
    /// 因监控项在检测期间被修改而丢弃的结果数
    pub checks_discarded: u64,
    /// 当前检测中的监控项数量
    pub in_flight: usize,
    /// 并发上限
    pub max_concurrent_checks: usize,
    /// 通知发送成功次数
    pub notifications_sent: u64,
    /// 通知发送失败次数
    pub notifications_failed: u64,
    /// 最后一次扫描时间（毫秒时间戳）
    pub last_tick_at: Option<i64>,
}

#[derive(Debug, Default)]
struct SchedulerCounters {
    running: AtomicBool,
    ticks: AtomicU64,
    checks_completed: AtomicU64,
    checks_discarded: AtomicU64,
    last_tick_at: AtomicI64,
}

/// 检测调度器
pub struct CheckScheduler {
    store: Arc<dyn MonitorStore>,
    checker: Arc<dyn HealthChecker>,
    notifier: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    in_flight: InFlight,
    semaphore: Arc<Semaphore>,
    /// 每个监控项最后一次确定的状态（UP/DOWN），用于判断状态切换
    settled: Mutex<HashMap<String, MonitorStatus>>,
    counters: SchedulerCounters,
}

impl CheckScheduler {
    /// 创建新的调度器
    ///
    /// # 参数
    /// * `store` - 监控项存储
    /// * `checker` - 健康检测器
    /// * `notifier` - 通知分发器
    /// * `config` - 调度器配置
    pub fn new(
        store: Arc<dyn MonitorStore>,
        checker: Arc<dyn HealthChecker>,
        notifier: Arc<NotificationDispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = config.max_concurrent_checks.max(1);
        Self {
            store,
            checker,
            notifier,
            clock: Arc::new(SystemClock),
            config,
            in_flight: InFlight::default(),
            semaphore: Arc::new(Semaphore::new(permits)),
            settled: Mutex::new(HashMap::new()),
            counters: SchedulerCounters::default(),
        }
    }

    /// 替换时钟
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 当前时间
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// 当前生效的全局检测间隔（秒）
    pub async fn global_interval(&self) -> Result<u64, StorageError> {
        Ok(self
            .store
            .get_settings()
            .await?
            .map(|s| s.global_interval)
            .unwrap_or(self.config.default_global_interval_seconds))
    }

    /// 判断监控项是否正在检测中
    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// 执行一次扫描：选出到期的监控项并等待它们检测完成
    pub async fn tick(&self) -> Result<TickReport, StorageError> {
        let now = self.clock.now_ms();
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);
        self.counters.last_tick_at.store(now, Ordering::Relaxed);

        let monitors = self.store.list().await?;
        let global_interval = self.global_interval().await?;

        let mut report = TickReport::default();
        let mut claimed = Vec::new();
        for monitor in monitors {
            if !monitor.is_due(now, global_interval) {
                continue;
            }
            report.due += 1;
            match self.in_flight.try_claim(&monitor.id) {
                Some(guard) => {
                    self.observe(&monitor);
                    claimed.push((monitor, guard));
                }
                None => report.skipped_in_flight += 1,
            }
        }
        report.started = claimed.len();

        if report.started > 0 {
            debug!(
                due = report.due,
                started = report.started,
                skipped = report.skipped_in_flight,
                "开始执行到期检测"
            );
        }

        join_all(
            claimed
                .into_iter()
                .map(|(monitor, guard)| self.run_check(monitor, guard)),
        )
        .await;

        Ok(report)
    }

    /// 周期性扫描，直到收到关闭信号
    ///
    /// 每次扫描都在独立任务中执行，慢扫描不会推迟下一次计时。
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let period = Duration::from_secs(self.config.tick_interval_seconds.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.counters.running.store(true, Ordering::SeqCst);
        info!(
            "检测调度器已启动，扫描间隔 {:?}，最大并发 {}",
            period, self.config.max_concurrent_checks
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let scheduler = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = scheduler.tick().await {
                            error!("扫描监控项失败: {}", e);
                        }
                    });
                }
                _ = shutdown.recv() => {
                    info!("收到关闭信号，停止检测调度器");
                    break;
                }
            }
        }

        self.counters.running.store(false, Ordering::SeqCst);
    }

    /// 立即检测单个监控项
    ///
    /// # 返回
    /// * `Result<Monitor, MonitorError>` - 写入结果后的监控项
    pub async fn check_now(&self, id: &str) -> Result<Monitor, MonitorError> {
        let mut monitor = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;

        let guard = self
            .in_flight
            .try_claim(id)
            .ok_or_else(|| MonitorError::CheckInProgress(id.to_string()))?;

        self.observe(&monitor);
        monitor.mark_pending();
        self.store.upsert(&monitor).await?;

        match self.run_check(monitor, guard).await {
            Some(updated) => Ok(updated),
            // 检测期间被修改或写入失败，返回存储中的当前状态
            None => self
                .store
                .get(id)
                .await?
                .ok_or_else(|| MonitorError::NotFound(id.to_string())),
        }
    }

    /// 检测所有未暂停的监控项（忽略到期时间，跳过检测中的）
    pub async fn check_all(&self) -> Result<CheckAllReport, StorageError> {
        let monitors = self.store.list().await?;
        let active: Vec<Monitor> = monitors.into_iter().filter(|m| !m.is_paused).collect();
        let total = active.len();

        let claimed: Vec<_> = active
            .into_iter()
            .filter_map(|monitor| {
                let guard = self.in_flight.try_claim(&monitor.id)?;
                self.observe(&monitor);
                Some((monitor, guard))
            })
            .collect();

        let results = join_all(
            claimed
                .into_iter()
                .map(|(monitor, guard)| self.run_check(monitor, guard)),
        )
        .await;

        let checked = results.iter().filter(|r| r.is_some()).count();
        info!("全量检测完成: {}/{}", checked, total);
        Ok(CheckAllReport { checked, total })
    }

    /// 清理已删除监控项的内部状态
    pub fn forget(&self, id: &str) {
        lock(&self.settled).remove(id);
    }

    /// 获取调度器状态
    pub fn status(&self) -> SchedulerStatus {
        let notifications = self.notifier.stats();
        let last_tick_at = self.counters.last_tick_at.load(Ordering::Relaxed);
        SchedulerStatus {
            is_running: self.counters.running.load(Ordering::SeqCst),
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            checks_completed: self.counters.checks_completed.load(Ordering::Relaxed),
            checks_discarded: self.counters.checks_discarded.load(Ordering::Relaxed),
            in_flight: self.in_flight.len(),
            max_concurrent_checks: self.config.max_concurrent_checks,
            notifications_sent: notifications.sent,
            notifications_failed: notifications.failed,
            last_tick_at: (last_tick_at != 0).then_some(last_tick_at),
        }
    }

    /// 第一次见到监控项时，用存储中的确定状态作为基准
    fn observe(&self, monitor: &Monitor) {
        if monitor.status.is_settled() {
            lock(&self.settled)
                .entry(monitor.id.clone())
                .or_insert(monitor.status);
        }
    }

    /// 执行一次检测并写入结果，持有检测中占用直到写入完成
    async fn run_check(&self, snapshot: Monitor, guard: InFlightGuard) -> Option<Monitor> {
        let _guard = guard;

        let permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!("并发信号量已关闭，跳过检测: {}", snapshot.name);
                return None;
            }
        };
        let timeout = Duration::from_secs(self.config.request_timeout_seconds);
        let mut result = self.checker.check_with_timeout(&snapshot.url, timeout).await;
        drop(permit);

        result.checked_at = self.clock.now_ms();
        self.apply_result(&snapshot, result).await
    }

    /// 写入检测结果；监控项在检测期间被删除、暂停或修改URL时丢弃结果
    async fn apply_result(&self, snapshot: &Monitor, result: CheckResult) -> Option<Monitor> {
        let mut current = match self.store.get(&snapshot.id).await {
            Ok(Some(monitor)) => monitor,
            Ok(None) => {
                debug!("监控项 {} 已删除，丢弃检测结果", snapshot.id);
                self.counters.checks_discarded.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                error!("读取监控项 {} 失败: {}", snapshot.id, e);
                return None;
            }
        };

        if current.is_paused != snapshot.is_paused || current.url != snapshot.url {
            debug!("监控项 {} 在检测期间被修改，丢弃检测结果", current.name);
            self.counters.checks_discarded.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        current.record_check(&result);
        if let Err(e) = self.store.upsert(&current).await {
            error!("保存监控项 {} 的检测结果失败: {}", current.name, e);
            return None;
        }
        self.counters.checks_completed.fetch_add(1, Ordering::Relaxed);

        // 结果落盘后才更新最近一次确定的状态
        let change = if current.is_paused {
            None
        } else {
            let previous = lock(&self.settled).insert(current.id.clone(), result.status);
            previous.and_then(|prev| StatusChange::between(prev, result.status))
        };

        debug!(
            monitor = %current.name,
            status = %result.status,
            status_code = result.status_code,
            latency_ms = result.latency_ms,
            "检测结果已保存"
        );

        if let Some(change) = change {
            info!(monitor = %current.name, ?change, "监控状态发生变化");
            self.notifier
                .notify(&current, change, result.error_message.clone());
        }

        Some(current)
    }
}
