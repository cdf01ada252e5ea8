//! 会话 payload 兼容处理
//!
//! 旧版本把登录身份存在 `user`，新版本存在 `passport.user`。读写时两者
//! 保持一致；读取时再根据记录的 `last_activity` 补全 `cookie` 元数据。

use serde_json::Value;

use super::cookie::CookieConfig;
use super::types::{Session, present};

/// 把旧版 `user` 迁移到 `passport.user`，返回是否发生了修改
pub fn migrate_identity(session: &mut Session) -> bool {
    if session.passport_user().is_some() {
        return false;
    }
    let Some(user) = session.user().cloned() else {
        return false;
    };
    session.entry_object("passport").insert("user".into(), user);
    true
}

/// 用 `passport.user` 回填旧版 `user`，返回是否发生了修改
pub fn backfill_legacy_user(session: &mut Session) -> bool {
    if session.user().is_some() {
        return false;
    }
    let Some(user) = session.passport_user().cloned() else {
        return false;
    };
    session.insert("user", user);
    true
}

/// 双向同步身份字段，两者都缺失时不做任何事
pub fn reconcile_identity(session: &mut Session) -> bool {
    let migrated = migrate_identity(session);
    let backfilled = backfill_legacy_user(session);
    migrated || backfilled
}

/// 补全 cookie 元数据，仅在读取时调用
///
/// `domain` 总是以当前配置为准，存储里的值不可信。
pub fn synthesize_cookie(session: &mut Session, last_activity: Option<i64>, config: &CookieConfig) {
    let cookie = session.entry_object("cookie");

    if present(cookie.get("expires")).is_none() {
        if let Some(last_activity) = last_activity {
            cookie.insert(
                "expires".into(),
                Value::from(last_activity.saturating_add(config.max_age)),
            );
        }
    }
    if present(cookie.get("originalMaxAge")).is_none() {
        cookie.insert("originalMaxAge".into(), Value::from(config.max_age));
    }
    match &config.domain {
        Some(domain) => {
            cookie.insert("domain".into(), Value::from(domain.clone()));
        }
        None => {
            cookie.remove("domain");
        }
    }
}
