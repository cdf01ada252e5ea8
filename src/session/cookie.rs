use std::sync::{Arc, RwLock};

/// 宿主框架的会话 Cookie 配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    /// 原样加到 `last_activity` 上得到 `cookie.expires`
    pub max_age: i64,
    pub domain: Option<String>,
}

/// 每次读取会话时获取当前 Cookie 配置，存储层自己不保存它
pub trait CookieSettings: Send + Sync {
    fn current(&self) -> CookieConfig;
}

impl CookieSettings for CookieConfig {
    fn current(&self) -> CookieConfig {
        self.clone()
    }
}

/// 宿主可以在运行时修改的共享配置
impl CookieSettings for Arc<RwLock<CookieConfig>> {
    fn current(&self) -> CookieConfig {
        self.read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
