//! 内存存储实现

use super::{sort_by_creation, MonitorStore, StoreResult};
use crate::monitor::{Monitor, Settings};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    monitors: HashMap<String, Monitor>,
    settings: Option<Settings>,
}

/// 进程内存储，重启后数据丢失
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用已有数据创建
    pub fn with_monitors(monitors: Vec<Monitor>) -> Self {
        let monitors = monitors.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self {
            state: RwLock::new(MemoryState {
                monitors,
                settings: None,
            }),
        }
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Monitor>> {
        let state = self.state.read().await;
        let mut monitors: Vec<Monitor> = state.monitors.values().cloned().collect();
        sort_by_creation(&mut monitors);
        Ok(monitors)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Monitor>> {
        Ok(self.state.read().await.monitors.get(id).cloned())
    }

    async fn upsert(&self, monitor: &Monitor) -> StoreResult<()> {
        self.state
            .write()
            .await
            .monitors
            .insert(monitor.id.clone(), monitor.clone());
        Ok(())
    }

    async fn upsert_many(&self, monitors: &[Monitor]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for monitor in monitors {
            state.monitors.insert(monitor.id.clone(), monitor.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.state.write().await.monitors.remove(id).is_some())
    }

    async fn get_settings(&self) -> StoreResult<Option<Settings>> {
        Ok(self.state.read().await.settings)
    }

    async fn set_settings(&self, settings: &Settings) -> StoreResult<()> {
        self.state.write().await.settings = Some(*settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_crud_cycle() {
        let store = MemoryStore::new();
        let first = Monitor::new("a.com", None, 2);
        let second = Monitor::new("b.com", None, 1);
        store.upsert_many(&[first.clone(), second.clone()]).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);

        let mut updated = first.clone();
        updated.set_url("c.com");
        store.upsert(&updated).await.unwrap();
        assert_eq!(store.get(&first.id).await.unwrap().unwrap().name, "c.com");

        assert!(store.delete(&first.id).await.unwrap());
        assert!(!store.delete(&first.id).await.unwrap());
        assert!(store.get(&first.id).await.unwrap().is_none());
    }

    #[test]
    fn test_settings_absent_until_set() {
        let store = MemoryStore::new();
        tokio_test::block_on(async {
            assert!(assert_ok!(store.get_settings().await).is_none());
            assert_ok!(store.set_settings(&Settings { global_interval: 30 }).await);
            let settings = assert_ok!(store.get_settings().await);
            assert_eq!(settings.map(|s| s.global_interval), Some(30));
        });
    }
}
