//! JSON文件存储实现
//!
//! 整个集合保存为一个文档 `{"monitors": [...], "settings": {...}}`，
//! 同时兼容只包含监控项数组的旧格式。

use super::{sort_by_creation, MonitorStore, StoreResult};
use crate::error::StorageError;
use crate::monitor::{Monitor, Settings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// 磁盘文档格式
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    monitors: Vec<Monitor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settings: Option<Settings>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OnDisk {
    Document(StoreDocument),
    Legacy(Vec<Monitor>),
}

/// JSON文件存储
///
/// 内容常驻内存，每次修改后整体写回文件。
pub struct JsonFileStore {
    path: PathBuf,
    document: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// 打开（或新建）JSON存储文件
    ///
    /// # 参数
    /// * `path` - 文件路径，不存在时在第一次写入时创建
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::parse(&content)?
        } else {
            StoreDocument::default()
        };

        tracing::info!(
            "从 {} 加载了 {} 个监控项",
            path.display(),
            document.monitors.len()
        );

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// 文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> StoreResult<StoreDocument> {
        if content.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        match serde_json::from_str::<OnDisk>(content) {
            Ok(OnDisk::Document(document)) => Ok(document),
            Ok(OnDisk::Legacy(mut monitors)) => {
                // 旧格式没有 createdAt，按文件中的顺序补齐
                for (position, monitor) in monitors.iter_mut().enumerate() {
                    if monitor.created_at == 0 {
                        monitor.created_at = position as i64;
                    }
                }
                Ok(StoreDocument {
                    monitors,
                    settings: None,
                })
            }
            Err(e) => Err(StorageError::Corrupt(format!("无法解析存储文件: {}", e))),
        }
    }

    /// 先写临时文件再重命名，避免写到一半的文件
    async fn persist(&self, document: &StoreDocument) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MonitorStore for JsonFileStore {
    async fn list(&self) -> StoreResult<Vec<Monitor>> {
        let mut monitors = self.document.lock().await.monitors.clone();
        sort_by_creation(&mut monitors);
        Ok(monitors)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Monitor>> {
        let document = self.document.lock().await;
        Ok(document.monitors.iter().find(|m| m.id == id).cloned())
    }

    async fn upsert(&self, monitor: &Monitor) -> StoreResult<()> {
        self.upsert_many(std::slice::from_ref(monitor)).await
    }

    async fn upsert_many(&self, monitors: &[Monitor]) -> StoreResult<()> {
        let mut document = self.document.lock().await;
        let mut next = document.clone();
        for monitor in monitors {
            match next.monitors.iter_mut().find(|m| m.id == monitor.id) {
                Some(existing) => *existing = monitor.clone(),
                None => next.monitors.push(monitor.clone()),
            }
        }
        self.persist(&next).await?;
        *document = next;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut document = self.document.lock().await;
        if !document.monitors.iter().any(|m| m.id == id) {
            return Ok(false);
        }
        let mut next = document.clone();
        next.monitors.retain(|m| m.id != id);
        self.persist(&next).await?;
        *document = next;
        Ok(true)
    }

    async fn get_settings(&self) -> StoreResult<Option<Settings>> {
        Ok(self.document.lock().await.settings)
    }

    async fn set_settings(&self, settings: &Settings) -> StoreResult<()> {
        let mut document = self.document.lock().await;
        let next = StoreDocument {
            settings: Some(*settings),
            ..document.clone()
        };
        self.persist(&next).await?;
        *document = next;
        Ok(())
    }
}
