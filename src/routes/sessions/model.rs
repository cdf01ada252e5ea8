use serde::{Deserialize, Serialize};

/// 健康检查响应
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务器时间
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    /// 本次清理删除的会话数
    pub removed: u64,
}
