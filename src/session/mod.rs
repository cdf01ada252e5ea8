// 会话模块
// 包含会话数据结构、Cookie 配置和 payload 兼容处理

pub mod cookie;
pub mod reconcile;
pub mod types;

// 重新导出常用类型
pub use cookie::{CookieConfig, CookieSettings};
pub use types::Session;
