use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 会话数据库实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SessionRecord {
    /// 会话ID，主键，创建后不再修改
    pub id: String,
    /// 最后活动时间（Unix 秒），每次写入时刷新
    pub last_activity: i64,
    /// JSON 序列化后的会话对象
    pub payload: String,
}
