//! 存储模块
//!
//! 定义监控项存储接口以及内存、JSON文件、SQLite三种实现

pub mod json_file;
pub mod memory;
pub mod sqlite;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StorageError;
use crate::monitor::{Monitor, Settings};
use async_trait::async_trait;
use std::sync::Arc;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// 存储操作结果
pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// 监控项存储接口
///
/// 调度器和API处理器共享同一个存储，写入以最后一次为准。
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// 列出所有监控项，按创建时间升序
    async fn list(&self) -> StoreResult<Vec<Monitor>>;

    /// 按ID获取监控项
    async fn get(&self, id: &str) -> StoreResult<Option<Monitor>>;

    /// 插入或更新单个监控项
    async fn upsert(&self, monitor: &Monitor) -> StoreResult<()>;

    /// 批量插入或更新
    async fn upsert_many(&self, monitors: &[Monitor]) -> StoreResult<()>;

    /// 删除监控项，返回是否存在
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// 读取全局设置，未存储时返回 `None`
    async fn get_settings(&self) -> StoreResult<Option<Settings>>;

    /// 写入全局设置
    async fn set_settings(&self, settings: &Settings) -> StoreResult<()>;
}

/// 根据配置打开存储后端
///
/// # 参数
/// * `config` - 存储配置
///
/// # 返回
/// * `StoreResult<Arc<dyn MonitorStore>>` - 存储实例
pub fn open_store(config: &StorageConfig) -> StoreResult<Arc<dyn MonitorStore>> {
    let store: Arc<dyn MonitorStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Json => Arc::new(JsonFileStore::open(&config.path)?),
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.path)?),
    };
    tracing::info!(backend = ?config.backend, path = %config.path.display(), "存储已打开");
    Ok(store)
}

/// 按创建时间排序，时间相同时按ID保证稳定
pub(crate) fn sort_by_creation(monitors: &mut [Monitor]) {
    monitors.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
