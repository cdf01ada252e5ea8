// 数据库操作
// 会话表的访问接口及其实现

use async_trait::async_trait;
use sqlx::Error as SqlxError;

use crate::database::models::session::SessionRecord;

// PostgreSQL 会话表
pub mod session;

// 内存会话表
pub mod memory;

pub use memory::MemorySessionTable;
pub use session::SessionOperation;

/// 会话表网关
///
/// 存储层只通过这些原语访问会话表，表本身的并发控制交给数据库。
#[async_trait]
pub trait SessionTable: Send + Sync + 'static {
    /// 确保会话表存在，`force` 为真时先删除再重建
    async fn sync(&self, force: bool) -> Result<(), SqlxError>;

    async fn find(&self, id: &str) -> Result<Option<SessionRecord>, SqlxError>;

    async fn create(&self, record: &SessionRecord) -> Result<(), SqlxError>;

    async fn update(&self, id: &str, payload: &str, last_activity: i64) -> Result<(), SqlxError>;

    /// 返回删除的行数
    async fn delete(&self, id: &str) -> Result<u64, SqlxError>;

    async fn count(&self) -> Result<u64, SqlxError>;

    /// 删除 `last_activity < cutoff` 的所有记录，返回删除的行数
    async fn delete_inactive_before(&self, cutoff: i64) -> Result<u64, SqlxError>;
}
