// 内存会话表
// 与 SQL 表行为一致：sync 建表前所有操作失败，create 拒绝重复的会话ID

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Error as SqlxError;
use tokio::sync::RwLock;

use super::SessionTable;
use crate::database::models::session::SessionRecord;

/// 进程内会话表，用于开发和测试
#[derive(Default)]
pub struct MemorySessionTable {
    // None 表示表尚未创建
    rows: RwLock<Option<HashMap<String, SessionRecord>>>,
}

fn missing_table() -> SqlxError {
    SqlxError::Protocol("relation \"sessions\" does not exist".into())
}

impl MemorySessionTable {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionTable for MemorySessionTable {
    async fn sync(&self, force: bool) -> Result<(), SqlxError> {
        let mut rows = self.rows.write().await;
        if force || rows.is_none() {
            *rows = Some(HashMap::new());
        }
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<SessionRecord>, SqlxError> {
        let rows = self.rows.read().await;
        let rows = rows.as_ref().ok_or_else(missing_table)?;
        Ok(rows.get(id).cloned())
    }

    async fn create(&self, record: &SessionRecord) -> Result<(), SqlxError> {
        let mut rows = self.rows.write().await;
        let rows = rows.as_mut().ok_or_else(missing_table)?;
        if rows.contains_key(&record.id) {
            return Err(SqlxError::Protocol(format!(
                "duplicate key value violates unique constraint \"sessions_pkey\": {}",
                record.id
            )));
        }
        rows.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, id: &str, payload: &str, last_activity: i64) -> Result<(), SqlxError> {
        let mut rows = self.rows.write().await;
        let rows = rows.as_mut().ok_or_else(missing_table)?;
        // 与 SQL UPDATE 一致，不存在的行静默跳过
        if let Some(record) = rows.get_mut(id) {
            record.payload = payload.to_string();
            record.last_activity = last_activity;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<u64, SqlxError> {
        let mut rows = self.rows.write().await;
        let rows = rows.as_mut().ok_or_else(missing_table)?;
        Ok(rows.remove(id).map_or(0, |_| 1))
    }

    async fn count(&self) -> Result<u64, SqlxError> {
        let rows = self.rows.read().await;
        let rows = rows.as_ref().ok_or_else(missing_table)?;
        Ok(rows.len() as u64)
    }

    async fn delete_inactive_before(&self, cutoff: i64) -> Result<u64, SqlxError> {
        let mut rows = self.rows.write().await;
        let rows = rows.as_mut().ok_or_else(missing_table)?;
        let before = rows.len();
        rows.retain(|_, record| record.last_activity >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}
