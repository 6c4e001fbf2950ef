//! 监控项服务
//!
//! 封装批量添加、修改、暂停、删除、手动检测和全局设置等操作

use crate::error::MonitorError;
use crate::health::{CheckAllReport, CheckScheduler};
use crate::monitor::{Monitor, Settings, Stats};
use crate::storage::MonitorStore;
use std::sync::Arc;
use tracing::info;

/// 监控项服务
#[derive(Clone)]
pub struct MonitorService {
    store: Arc<dyn MonitorStore>,
    scheduler: Arc<CheckScheduler>,
}

impl MonitorService {
    pub fn new(store: Arc<dyn MonitorStore>, scheduler: Arc<CheckScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// 调度器
    pub fn scheduler(&self) -> &Arc<CheckScheduler> {
        &self.scheduler
    }

    /// 列出所有监控项
    pub async fn list(&self) -> Result<Vec<Monitor>, MonitorError> {
        Ok(self.store.list().await?)
    }

    /// 按ID获取监控项
    pub async fn get(&self, id: &str) -> Result<Monitor, MonitorError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))
    }

    /// 批量添加监控项
    ///
    /// # 参数
    /// * `urls` - 以换行分隔的URL列表，空行被忽略
    /// * `interval` - 单独的检测间隔（秒），不能小于下限
    ///
    /// # 返回
    /// * `Result<Vec<Monitor>, MonitorError>` - 新建的监控项
    pub async fn add_bulk(
        &self,
        urls: &str,
        interval: Option<u64>,
    ) -> Result<Vec<Monitor>, MonitorError> {
        if let Some(interval) = interval {
            Settings::validate_interval(interval).map_err(MonitorError::Validation)?;
        }

        // 同一批次按输入顺序递增创建时间，列表顺序与输入一致
        let now = self.scheduler.now_ms();
        let monitors: Vec<Monitor> = urls
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| Monitor::new(line, interval, now + i as i64))
            .collect();

        if monitors.is_empty() {
            return Err(MonitorError::Validation("URLs required".to_string()));
        }

        self.store.upsert_many(&monitors).await?;
        info!("新增 {} 个监控项", monitors.len());
        Ok(monitors)
    }

    /// 修改监控项URL
    pub async fn update_url(&self, id: &str, url: Option<&str>) -> Result<Monitor, MonitorError> {
        let mut monitor = self.get(id).await?;
        if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
            monitor.set_url(url);
            self.store.upsert(&monitor).await?;
            info!("监控项 {} 的URL已修改为 {}", monitor.id, monitor.url);
        }
        Ok(monitor)
    }

    /// 切换暂停状态
    pub async fn toggle(&self, id: &str) -> Result<Monitor, MonitorError> {
        let mut monitor = self.get(id).await?;
        monitor.toggle_pause();
        self.store.upsert(&monitor).await?;
        info!(
            "监控项 {} 已{}",
            monitor.name,
            if monitor.is_paused { "暂停" } else { "恢复" }
        );
        Ok(monitor)
    }

    /// 删除监控项
    pub async fn delete(&self, id: &str) -> Result<(), MonitorError> {
        if !self.store.delete(id).await? {
            return Err(MonitorError::NotFound(id.to_string()));
        }
        self.scheduler.forget(id);
        info!("监控项 {} 已删除", id);
        Ok(())
    }

    /// 立即检测单个监控项
    pub async fn check_now(&self, id: &str) -> Result<Monitor, MonitorError> {
        self.scheduler.check_now(id).await
    }

    /// 检测所有未暂停的监控项
    pub async fn check_all(&self) -> Result<CheckAllReport, MonitorError> {
        Ok(self.scheduler.check_all().await?)
    }

    /// 获取全局设置
    pub async fn settings(&self) -> Result<Settings, MonitorError> {
        Ok(Settings {
            global_interval: self.scheduler.global_interval().await?,
        })
    }

    /// 更新全局检测间隔
    pub async fn update_settings(&self, global_interval: u64) -> Result<Settings, MonitorError> {
        Settings::validate_interval(global_interval).map_err(MonitorError::Validation)?;
        let settings = Settings { global_interval };
        self.store.set_settings(&settings).await?;
        info!("全局检测间隔已更新为 {} 秒", global_interval);
        Ok(settings)
    }

    /// 汇总统计
    pub async fn stats(&self) -> Result<Stats, MonitorError> {
        Ok(Stats::from_monitors(&self.store.list().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::health::{CheckResult, HealthChecker, ManualClock};
    use crate::monitor::MonitorStatus;
    use crate::notification::NotificationDispatcher;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct AlwaysUp;

    #[async_trait]
    impl HealthChecker for AlwaysUp {
        async fn check(&self, _url: &str) -> CheckResult {
            CheckResult::new(MonitorStatus::Up, 0).with_status_code(200).with_latency(10)
        }

        async fn check_with_timeout(&self, url: &str, _timeout: Duration) -> CheckResult {
            self.check(url).await
        }
    }

    fn service() -> MonitorService {
        let store: Arc<dyn MonitorStore> = Arc::new(MemoryStore::new());
        let scheduler = CheckScheduler::new(
            store.clone(),
            Arc::new(AlwaysUp),
            Arc::new(NotificationDispatcher::new(Vec::new()).unwrap()),
            SchedulerConfig::default(),
        )
        .with_clock(Arc::new(ManualClock::new(1_000)));
        MonitorService::new(store, Arc::new(scheduler))
    }

    #[tokio::test]
    async fn test_add_bulk_skips_blank_lines() {
        let service = service();
        let created = service
            .add_bulk("example.com\n\n  http://foo.test/x  \n", None)
            .await
            .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(created[0].url, "https://example.com");
        assert_eq!(created[0].name, "example.com");
        assert_eq!(created[1].url, "http://foo.test/x");
        assert_eq!(created[1].name, "foo.test");
        assert_eq!(created[0].created_at, 1_000);
        assert_eq!(created[1].created_at, 1_001);
        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_bulk_validation() {
        let service = service();
        let err = service.add_bulk(" \n\n", None).await.unwrap_err();
        assert_eq!(err.to_string(), "URLs required");

        let err = service.add_bulk("example.com", Some(5)).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid interval (must be >= 10 seconds)");
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_url_resets_to_pending() {
        let service = service();
        let created = service.add_bulk("example.com", None).await.unwrap();
        let id = &created[0].id;
        service.check_now(id).await.unwrap();

        let updated = service.update_url(id, Some("example.org/health")).await.unwrap();
        assert_eq!(updated.url, "https://example.org/health");
        assert_eq!(updated.name, "example.org");
        assert_eq!(updated.status, MonitorStatus::Pending);

        let err = service.update_url("missing", Some("a.com")).await.unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_toggle_twice() {
        let service = service();
        let created = service.add_bulk("example.com", None).await.unwrap();
        let id = &created[0].id;

        let paused = service.toggle(id).await.unwrap();
        assert!(paused.is_paused);
        assert_eq!(paused.status, MonitorStatus::Paused);

        let resumed = service.toggle(id).await.unwrap();
        assert!(!resumed.is_paused);
        assert_eq!(resumed.status, MonitorStatus::Pending);
    }

    #[tokio::test]
    async fn test_delete() {
        let service = service();
        let created = service.add_bulk("example.com", None).await.unwrap();
        service.delete(&created[0].id).await.unwrap();
        assert!(matches!(
            service.delete(&created[0].id).await.unwrap_err(),
            MonitorError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_settings_default_and_update() {
        let service = service();
        assert_eq!(service.settings().await.unwrap().global_interval, 3600);

        let err = service.update_settings(9).await.unwrap_err();
        assert!(matches!(err, MonitorError::Validation(_)));

        service.update_settings(45).await.unwrap();
        assert_eq!(service.settings().await.unwrap().global_interval, 45);
    }

    #[tokio::test]
    async fn test_stats_and_check_all() {
        let service = service();
        service.add_bulk("a.com\nb.com", None).await.unwrap();
        let report = service.check_all().await.unwrap();
        assert_eq!(report, CheckAllReport { checked: 2, total: 2 });

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.up, 2);
        assert_eq!(stats.avg_latency, 10);
    }
}
