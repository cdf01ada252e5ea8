/// 数据库实体
pub mod session;
