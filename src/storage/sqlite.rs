//! SQLite存储实现
//!
//! 每个监控项一行，历史点以JSON文本保存；全局设置保存在 `settings` 表的 `global` 行。
//! 使用 `schema_version` 表记录已执行的迁移。

use super::{MonitorStore, StoreResult};
use crate::error::StorageError;
use crate::monitor::{LatencyPoint, Monitor, MonitorStatus, Settings};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// 当前数据库结构版本
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

const SETTINGS_ID: &str = "global";

const SELECT_COLUMNS: &str = "id, url, name, status, status_code, last_checked, latency, \
     history, interval_seconds, is_paused, created_at";

/// SQLite存储
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开（或创建）数据库文件并执行迁移
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// 打开内存数据库，主要用于测试
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程池中使用连接
    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

/// 读取当前结构版本（表不存在时为0）
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let current = get_schema_version(conn);

    if current < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS monitors (
                 id TEXT PRIMARY KEY,
                 url TEXT NOT NULL,
                 name TEXT NOT NULL,
                 status TEXT NOT NULL,
                 status_code INTEGER,
                 last_checked INTEGER,
                 latency INTEGER,
                 history TEXT NOT NULL DEFAULT '[]',
                 interval_seconds INTEGER,
                 is_paused INTEGER NOT NULL DEFAULT 0,
                 created_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_monitors_created_at ON monitors(created_at);
             CREATE TABLE IF NOT EXISTS settings (
                 id TEXT PRIMARY KEY,
                 global_interval INTEGER NOT NULL
             );",
        )?;
        record_version(conn, 1, "Initial schema: monitors and settings")?;
    }

    Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        params![version, chrono::Utc::now().timestamp(), description],
    )?;
    Ok(())
}

/// 数据库中的原始行
struct MonitorRow {
    id: String,
    url: String,
    name: String,
    status: String,
    status_code: Option<i64>,
    last_checked: Option<i64>,
    latency: Option<i64>,
    history: String,
    interval_seconds: Option<i64>,
    is_paused: bool,
    created_at: i64,
}

impl MonitorRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            name: row.get(2)?,
            status: row.get(3)?,
            status_code: row.get(4)?,
            last_checked: row.get(5)?,
            latency: row.get(6)?,
            history: row.get(7)?,
            interval_seconds: row.get(8)?,
            is_paused: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl TryFrom<MonitorRow> for Monitor {
    type Error = StorageError;

    fn try_from(row: MonitorRow) -> Result<Self, Self::Error> {
        let status: MonitorStatus = row.status.parse().map_err(StorageError::Corrupt)?;
        let history: VecDeque<LatencyPoint> = serde_json::from_str(&row.history)?;
        let status_code = row
            .status_code
            .map(|code| {
                u16::try_from(code)
                    .map_err(|_| StorageError::Corrupt(format!("无效的HTTP状态码: {}", code)))
            })
            .transpose()?;
        Ok(Monitor {
            id: row.id,
            url: row.url,
            name: row.name,
            status,
            status_code,
            last_checked: row.last_checked,
            latency: row.latency.map(|l| l.max(0) as u64),
            history,
            interval: row.interval_seconds.map(|i| i.max(0) as u64),
            is_paused: row.is_paused,
            created_at: row.created_at,
        })
    }
}

fn upsert_row(conn: &Connection, monitor: &Monitor) -> StoreResult<()> {
    let history = serde_json::to_string(&monitor.history)?;
    conn.execute(
        "INSERT INTO monitors (id, url, name, status, status_code, last_checked, latency,
                               history, interval_seconds, is_paused, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
             url = excluded.url,
             name = excluded.name,
             status = excluded.status,
             status_code = excluded.status_code,
             last_checked = excluded.last_checked,
             latency = excluded.latency,
             history = excluded.history,
             interval_seconds = excluded.interval_seconds,
             is_paused = excluded.is_paused",
        params![
            monitor.id,
            monitor.url,
            monitor.name,
            monitor.status.as_str(),
            monitor.status_code.map(i64::from),
            monitor.last_checked,
            monitor.latency.map(|l| l as i64),
            history,
            monitor.interval.map(|i| i as i64),
            monitor.is_paused,
            monitor.created_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl MonitorStore for SqliteStore {
    async fn list(&self) -> StoreResult<Vec<Monitor>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM monitors ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt
                .query_map([], MonitorRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(Monitor::try_from).collect()
        })
        .await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Monitor>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM monitors WHERE id = ?1"),
                    params![id],
                    MonitorRow::from_row,
                )
                .optional()?;
            row.map(Monitor::try_from).transpose()
        })
        .await
    }

    async fn upsert(&self, monitor: &Monitor) -> StoreResult<()> {
        let monitor = monitor.clone();
        self.with_conn(move |conn| upsert_row(conn, &monitor)).await
    }

    async fn upsert_many(&self, monitors: &[Monitor]) -> StoreResult<()> {
        let monitors = monitors.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for monitor in &monitors {
                upsert_row(&tx, monitor)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let affected = conn.execute("DELETE FROM monitors WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })
        .await
    }

    async fn get_settings(&self) -> StoreResult<Option<Settings>> {
        self.with_conn(|conn| {
            let interval: Option<i64> = conn
                .query_row(
                    "SELECT global_interval FROM settings WHERE id = ?1",
                    params![SETTINGS_ID],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(interval.map(|i| Settings {
                global_interval: i.max(0) as u64,
            }))
        })
        .await
    }

    async fn set_settings(&self, settings: &Settings) -> StoreResult<()> {
        let interval = settings.global_interval as i64;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO settings (id, global_interval) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET global_interval = excluded.global_interval",
                params![SETTINGS_ID, interval],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::result::CheckResult;

    #[tokio::test]
    async fn test_migrations_are_recorded_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn.lock().unwrap();
        assert_eq!(get_schema_version(&conn), CURRENT_SCHEMA_VERSION);
        run_migrations(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_monitor_round_trip_with_history() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut monitor = Monitor::new("example.com/status", Some(45), 10);
        monitor.record_check(
            &CheckResult::new(MonitorStatus::Up, 1_000)
                .with_status_code(200)
                .with_latency(88),
        );

        store.upsert(&monitor).await.unwrap();
        let loaded = store.get(&monitor.id).await.unwrap().unwrap();
        assert_eq!(loaded, monitor);

        monitor.toggle_pause();
        store.upsert_many(&[monitor.clone()]).await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_paused);
        assert_eq!(listed[0].status, MonitorStatus::Paused);
    }

    #[tokio::test]
    async fn test_out_of_range_status_code_is_corrupt() {
        let store = SqliteStore::open_in_memory().unwrap();
        let monitor = Monitor::new("example.com", None, 1);
        store.upsert(&monitor).await.unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE monitors SET status_code = 70000 WHERE id = ?1",
                params![monitor.id],
            )
            .unwrap();
        }

        let result = store.get(&monitor.id).await;
        assert!(matches!(result, Err(StorageError::Corrupt(_))));
        assert!(store.list().await.is_err());
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_settings().await.unwrap().is_none());
        store.set_settings(&Settings { global_interval: 60 }).await.unwrap();
        store.set_settings(&Settings { global_interval: 90 }).await.unwrap();
        assert_eq!(store.get_settings().await.unwrap().unwrap().global_interval, 90);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = SqliteStore::open_in_memory().unwrap();
        let monitor = Monitor::new("a.com", None, 1);
        store.upsert(&monitor).await.unwrap();
        assert!(store.delete(&monitor.id).await.unwrap());
        assert!(!store.delete(&monitor.id).await.unwrap());
    }
}
