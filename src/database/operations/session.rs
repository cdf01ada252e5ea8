// 会话存储库
// 包含会话表相关的数据库操作

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Error as SqlxError, PgPool};

use super::SessionTable;
use crate::database::models::session::SessionRecord;

/// 会话存储库，处理所有与 sessions 表相关的数据库操作
pub struct SessionOperation {
    db: Arc<PgPool>,
}

impl SessionOperation {
    /// 创建新的会话存储库实例
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionTable for SessionOperation {
    async fn sync(&self, force: bool) -> Result<(), SqlxError> {
        let mut tx = self.db.begin().await?;

        if force {
            tracing::warn!("Dropping sessions table before re-creating it");
            sqlx::query("DROP TABLE IF EXISTS sessions")
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(255) PRIMARY KEY,
                last_activity BIGINT,
                payload TEXT
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!("Sessions table is ready");
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<SessionRecord>, SqlxError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT
                id,
                COALESCE(last_activity, 0) AS last_activity,
                COALESCE(payload, '{}') AS payload
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        Ok(record)
    }

    async fn create(&self, record: &SessionRecord) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, last_activity, payload)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&record.id)
        .bind(record.last_activity)
        .bind(&record.payload)
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    async fn update(&self, id: &str, payload: &str, last_activity: i64) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET payload = $2, last_activity = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(payload)
        .bind(last_activity)
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<u64, SqlxError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, SqlxError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&*self.db)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn delete_inactive_before(&self, cutoff: i64) -> Result<u64, SqlxError> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity < $1")
            .bind(cutoff)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
