use std::env;
use std::time::Duration;

use crate::session::CookieConfig;

/// 默认每 10 分钟检查一次过期会话
pub const DEFAULT_CHECK_EXPIRATION_INTERVAL_MS: u64 = 1000 * 60 * 10;
/// 默认 1 天无活动后会话可被清理
pub const DEFAULT_EXPIRATION_SECS: u64 = 60 * 60 * 24;

/// 会话存储选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// 初始化时删除并重建会话表
    pub force_sync: bool,
    pub check_expiration_interval: Duration,
    pub default_expiration: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            force_sync: false,
            check_expiration_interval: Duration::from_millis(DEFAULT_CHECK_EXPIRATION_INTERVAL_MS),
            default_expiration: Duration::from_secs(DEFAULT_EXPIRATION_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub store: StoreOptions,
    pub cookie: CookieConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();
        Self::from_source(|key| env::var(key))
    }

    /// 从任意键值来源读取配置，缺省项使用默认值
    pub fn from_source<F>(var: F) -> Result<Self, env::VarError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let optional = |key: &str| var(key).ok().filter(|value| !value.trim().is_empty());

        let force_sync = optional("SESSION_FORCE_SYNC")
            .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);
        // tokio 的 interval 不接受 0
        let check_interval_ms = optional("SESSION_CHECK_EXPIRATION_INTERVAL")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_CHECK_EXPIRATION_INTERVAL_MS)
            .max(1);
        let expiration_secs = optional("SESSION_DEFAULT_EXPIRATION")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_EXPIRATION_SECS);

        Ok(Config {
            database_url: var("DATABASE_URL")?,
            server_host: var("SERVER_HOST")?,
            server_port: var("SERVER_PORT")?.parse().unwrap_or(3000),
            api_base_uri: optional("API_BASE_URI").unwrap_or_else(|| "/api".to_string()),
            store: StoreOptions {
                force_sync,
                check_expiration_interval: Duration::from_millis(check_interval_ms),
                default_expiration: Duration::from_secs(expiration_secs),
            },
            cookie: CookieConfig {
                max_age: optional("SESSION_COOKIE_MAX_AGE")
                    .and_then(|value| value.trim().parse::<i64>().ok())
                    .unwrap_or(DEFAULT_EXPIRATION_SECS as i64),
                domain: optional("SESSION_COOKIE_DOMAIN"),
            },
        })
    }
}
