//! 会话记录存储
//!
//! 所有操作先通过 [`InitGate`] 确保会话表存在，再访问 [`SessionTable`]。
//!
//! `set` 先查询记录是否存在再决定插入或更新，两步之间没有事务保护：
//! 同一会话的并发写入可能导致插入时主键冲突（以 `StoreError::Query`
//! 返回给调用方），或者并发更新时后写覆盖先写。

pub mod gate;
pub mod sweeper;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;

use crate::config::StoreOptions;
use crate::database::{SessionRecord, SessionTable};
use crate::error::StoreError;
use crate::session::reconcile;
use crate::session::{CookieSettings, Session};
use crate::utils::now_secs;

pub use gate::InitGate;
pub use sweeper::{SweeperHandle, spawn_sweeper};

/// 提供给 Web 框架会话中间件的存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 会话不存在时返回空会话
    async fn get(&self, sid: &str) -> Result<Session, StoreError>;

    async fn set(&self, sid: &str, session: &Session) -> Result<(), StoreError>;

    /// 会话不存在时同样视为成功
    async fn destroy(&self, sid: &str) -> Result<(), StoreError>;

    /// 会话总数，仅用于诊断，失败时返回 `None`
    async fn length(&self) -> Option<u64>;

    /// 删除并重建会话表
    async fn clear(&self) -> Result<(), StoreError>;
}

/// 支持手动清理过期会话的存储
#[async_trait]
pub trait SweepableStore: SessionStore {
    /// 删除超过过期时间未活动的会话，返回删除数量
    async fn sweep_expired(&self) -> Result<u64, StoreError>;
}

/// 基于会话表的存储实现
pub struct SessionRecordStore<T: SessionTable> {
    table: Arc<T>,
    gate: InitGate,
    options: StoreOptions,
    cookie: Arc<dyn CookieSettings>,
}

impl<T: SessionTable> SessionRecordStore<T> {
    pub fn new(table: Arc<T>, options: StoreOptions, cookie: impl CookieSettings + 'static) -> Self {
        Self {
            table,
            gate: InitGate::new(),
            options,
            cookie: Arc::new(cookie),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    async fn ensure_ready(&self) -> Result<(), StoreError> {
        let table = Arc::clone(&self.table);
        let force = self.options.force_sync;
        self.gate
            .ensure_ready(move || async move { table.sync(force).await }.boxed())
            .await
    }

    /// 整体替换 payload，记录不存在时插入
    async fn write(&self, sid: &str, session: &Session) -> Result<(), StoreError> {
        let payload = serde_json::to_string(session)
            .map_err(|e| StoreError::Serialization(Arc::new(e)))?;

        let existing = self
            .table
            .find(sid)
            .await
            .map_err(|e| query_failed("find", sid, e))?;

        match existing {
            Some(record) => {
                // 时钟回拨时也不让 last_activity 倒退
                let last_activity = now_secs().max(record.last_activity);
                self.table
                    .update(sid, &payload, last_activity)
                    .await
                    .map_err(|e| query_failed("update", sid, e))
            }
            None => {
                let record = SessionRecord {
                    id: sid.to_string(),
                    last_activity: now_secs(),
                    payload,
                };
                self.table
                    .create(&record)
                    .await
                    .map_err(|e| query_failed("create", sid, e))
            }
        }
    }
}

fn query_failed(operation: &'static str, sid: &str, error: sqlx::Error) -> StoreError {
    tracing::error!(operation, sid, error = %error, "Session query failed");
    StoreError::query(error)
}

#[async_trait]
impl<T: SessionTable> SessionStore for SessionRecordStore<T> {
    async fn get(&self, sid: &str) -> Result<Session, StoreError> {
        self.ensure_ready().await?;

        let Some(record) = self
            .table
            .find(sid)
            .await
            .map_err(|e| query_failed("find", sid, e))?
        else {
            return Ok(Session::new());
        };

        let mut session: Session = serde_json::from_str(&record.payload).map_err(|e| {
            tracing::error!(sid, error = %e, "Stored session payload is malformed");
            StoreError::Deserialization(Arc::new(e))
        })?;

        // 只有旧版 `user` 迁移到 `passport.user` 时才写回，写回失败不影响本次读取
        if reconcile::migrate_identity(&mut session) {
            tracing::debug!(sid, "Migrated legacy session identity");
            if self.write(sid, &session).await.is_err() {
                tracing::debug!(sid, "Migrated session identity was not persisted");
            }
        }
        reconcile::backfill_legacy_user(&mut session);

        reconcile::synthesize_cookie(
            &mut session,
            Some(record.last_activity),
            &self.cookie.current(),
        );

        Ok(session)
    }

    async fn set(&self, sid: &str, session: &Session) -> Result<(), StoreError> {
        let mut session = session.clone();
        reconcile::reconcile_identity(&mut session);

        self.ensure_ready().await?;
        self.write(sid, &session).await
    }

    async fn destroy(&self, sid: &str) -> Result<(), StoreError> {
        self.ensure_ready().await?;

        let removed = self
            .table
            .delete(sid)
            .await
            .map_err(|e| query_failed("delete", sid, e))?;
        tracing::debug!(sid, removed, "Destroyed session");
        Ok(())
    }

    async fn length(&self) -> Option<u64> {
        self.ensure_ready().await.ok()?;

        match self.table.count().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count sessions");
                None
            }
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.table.sync(true).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to clear sessions table");
            StoreError::query(e)
        })?;
        self.gate.mark_ready().await;
        tracing::info!("Cleared all sessions");
        Ok(())
    }
}

#[async_trait]
impl<T: SessionTable> SweepableStore for SessionRecordStore<T> {
    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        self.ensure_ready().await?;

        let expiration = i64::try_from(self.options.default_expiration.as_secs()).unwrap_or(i64::MAX);
        let cutoff = now_secs().saturating_sub(expiration);
        self.table
            .delete_inactive_before(cutoff)
            .await
            .map_err(|e| {
                tracing::error!(cutoff, error = %e, "Failed to delete expired sessions");
                StoreError::query(e)
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::database::MemorySessionTable;
    use crate::session::CookieConfig;

    /// 记录 sync 次数并可注入失败的会话表
    #[derive(Default)]
    pub(crate) struct CountingTable {
        pub inner: MemorySessionTable,
        pub syncs: AtomicUsize,
        pub fail_sync: AtomicBool,
        pub fail_queries: AtomicBool,
        pub fail_writes: AtomicBool,
    }

    impl CountingTable {
        fn check(&self) -> Result<(), sqlx::Error> {
            if self.fail_queries.load(Ordering::SeqCst) {
                Err(sqlx::Error::PoolTimedOut)
            } else {
                Ok(())
            }
        }

        fn check_write(&self) -> Result<(), sqlx::Error> {
            self.check()?;
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(sqlx::Error::PoolTimedOut)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SessionTable for CountingTable {
        async fn sync(&self, force: bool) -> Result<(), sqlx::Error> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_sync.load(Ordering::SeqCst) {
                return Err(sqlx::Error::PoolTimedOut);
            }
            self.inner.sync(force).await
        }

        async fn find(&self, id: &str) -> Result<Option<SessionRecord>, sqlx::Error> {
            self.check()?;
            self.inner.find(id).await
        }

        async fn create(&self, record: &SessionRecord) -> Result<(), sqlx::Error> {
            self.check_write()?;
            self.inner.create(record).await
        }

        async fn update(&self, id: &str, payload: &str, last_activity: i64) -> Result<(), sqlx::Error> {
            self.check_write()?;
            self.inner.update(id, payload, last_activity).await
        }

        async fn delete(&self, id: &str) -> Result<u64, sqlx::Error> {
            self.check()?;
            self.inner.delete(id).await
        }

        async fn count(&self) -> Result<u64, sqlx::Error> {
            self.check()?;
            self.inner.count().await
        }

        async fn delete_inactive_before(&self, cutoff: i64) -> Result<u64, sqlx::Error> {
            self.check()?;
            self.inner.delete_inactive_before(cutoff).await
        }
    }

    pub(crate) fn cookie_config() -> CookieConfig {
        CookieConfig {
            max_age: 3600,
            domain: Some("example.com".into()),
        }
    }

    pub(crate) fn store_with(
        options: StoreOptions,
    ) -> (Arc<CountingTable>, SessionRecordStore<CountingTable>) {
        let table = Arc::new(CountingTable::default());
        let store = SessionRecordStore::new(Arc::clone(&table), options, cookie_config());
        (table, store)
    }

    fn session(value: Value) -> Session {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn get_unknown_sid_returns_empty_session() {
        let (_, store) = store_with(StoreOptions::default());
        assert!(store.get("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_then_get_fills_passport_and_cookie() {
        let (table, store) = store_with(StoreOptions::default());
        store.set("abc", &session(json!({"user": "alice"}))).await.unwrap();

        let last_activity = table.inner.find("abc").await.unwrap().unwrap().last_activity;
        let loaded = store.get("abc").await.unwrap();
        assert_eq!(
            Value::Object(loaded.into_map()),
            json!({
                "user": "alice",
                "passport": {"user": "alice"},
                "cookie": {
                    "expires": last_activity + 3600,
                    "originalMaxAge": 3600,
                    "domain": "example.com"
                }
            })
        );
    }

    #[tokio::test]
    async fn passport_only_session_reads_back_with_legacy_user() {
        let (_, store) = store_with(StoreOptions::default());
        store
            .set("s1", &session(json!({"passport": {"user": {"id": 42}}})))
            .await
            .unwrap();

        let loaded = store.get("s1").await.unwrap();
        assert_eq!(loaded.user(), Some(&json!({"id": 42})));
        assert_eq!(loaded.user(), loaded.passport_user());
    }

    #[tokio::test]
    async fn legacy_rows_are_migrated_and_written_back() {
        let (table, store) = store_with(StoreOptions::default());
        store.length().await.unwrap();
        table
            .inner
            .create(&SessionRecord {
                id: "legacy".into(),
                last_activity: now_secs() - 10,
                payload: r#"{"user":"bob"}"#.into(),
            })
            .await
            .unwrap();

        let loaded = store.get("legacy").await.unwrap();
        assert_eq!(loaded.passport_user(), Some(&json!("bob")));

        let stored = table.inner.find("legacy").await.unwrap().unwrap();
        let stored: Value = serde_json::from_str(&stored.payload).unwrap();
        assert_eq!(stored, json!({"user": "bob", "passport": {"user": "bob"}}));
    }

    #[tokio::test]
    async fn passport_only_read_leaves_row_untouched() {
        let (table, store) = store_with(StoreOptions::default());
        store.length().await.unwrap();
        let last_activity = now_secs() - 5_000;
        let payload = r#"{"passport":{"user":"eve"}}"#;
        table
            .inner
            .create(&SessionRecord {
                id: "eve".into(),
                last_activity,
                payload: payload.into(),
            })
            .await
            .unwrap();

        let loaded = store.get("eve").await.unwrap();
        assert_eq!(loaded.user(), Some(&json!("eve")));

        let stored = table.inner.find("eve").await.unwrap().unwrap();
        assert_eq!(stored.last_activity, last_activity);
        assert_eq!(stored.payload, payload);
    }

    #[tokio::test]
    async fn failed_write_back_still_returns_migrated_session() {
        let (table, store) = store_with(StoreOptions::default());
        store.length().await.unwrap();
        let payload = r#"{"user":"bob"}"#;
        table
            .inner
            .create(&SessionRecord {
                id: "legacy".into(),
                last_activity: now_secs(),
                payload: payload.into(),
            })
            .await
            .unwrap();

        table.fail_writes.store(true, Ordering::SeqCst);
        let loaded = store.get("legacy").await.unwrap();
        assert_eq!(loaded.user(), Some(&json!("bob")));
        assert_eq!(loaded.passport_user(), Some(&json!("bob")));

        assert_eq!(table.inner.find("legacy").await.unwrap().unwrap().payload, payload);
    }

    async fn pre_created_table() -> Arc<CountingTable> {
        let table = Arc::new(CountingTable::default());
        table.inner.sync(false).await.unwrap();
        table
            .inner
            .create(&SessionRecord {
                id: "kept".into(),
                last_activity: now_secs(),
                payload: "{}".into(),
            })
            .await
            .unwrap();
        table
    }

    #[tokio::test]
    async fn force_sync_discards_existing_rows_on_first_use() {
        let table = pre_created_table().await;
        let store = SessionRecordStore::new(
            Arc::clone(&table),
            StoreOptions {
                force_sync: true,
                ..StoreOptions::default()
            },
            cookie_config(),
        );

        assert_eq!(store.length().await, Some(0));
        assert!(store.get("kept").await.unwrap().is_empty());
        assert_eq!(table.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn default_sync_keeps_existing_rows() {
        let table = pre_created_table().await;
        let store = SessionRecordStore::new(Arc::clone(&table), StoreOptions::default(), cookie_config());

        assert_eq!(store.length().await, Some(1));
        assert!(!store.get("kept").await.unwrap().is_empty());
        assert_eq!(table.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_deserialization_error() {
        let (table, store) = store_with(StoreOptions::default());
        store.length().await.unwrap();
        table
            .inner
            .create(&SessionRecord {
                id: "broken".into(),
                last_activity: now_secs(),
                payload: "{not json".into(),
            })
            .await
            .unwrap();

        let error = store.get("broken").await.unwrap_err();
        assert!(matches!(error, StoreError::Deserialization(_)));
    }

    #[tokio::test]
    async fn destroy_then_get_returns_empty_session() {
        let (_, store) = store_with(StoreOptions::default());
        store.set("gone", &session(json!({"views": 2}))).await.unwrap();

        store.destroy("gone").await.unwrap();
        store.destroy("never-set").await.unwrap();

        assert!(store.get("gone").await.unwrap().is_empty());
        assert!(store.get("never-set").await.unwrap().is_empty());
        assert_eq!(store.length().await, Some(0));
    }

    #[tokio::test]
    async fn repeated_set_never_moves_last_activity_backwards() {
        let (table, store) = store_with(StoreOptions::default());
        store.length().await.unwrap();
        let future = now_secs() + 1_000;
        table
            .inner
            .create(&SessionRecord {
                id: "s".into(),
                last_activity: future,
                payload: "{}".into(),
            })
            .await
            .unwrap();

        store.set("s", &session(json!({"n": 1}))).await.unwrap();
        let first = table.inner.find("s").await.unwrap().unwrap();
        assert_eq!(first.last_activity, future);

        store.set("s", &session(json!({"n": 2}))).await.unwrap();
        let second = table.inner.find("s").await.unwrap().unwrap();
        assert!(second.last_activity >= first.last_activity);
        assert_eq!(second.payload, r#"{"n":2}"#);
        assert_eq!(store.length().await, Some(1));
    }

    #[tokio::test]
    async fn clear_discards_all_sessions() {
        let (_, store) = store_with(StoreOptions::default());
        store.set("a", &session(json!({"n": 1}))).await.unwrap();
        store.set("b", &session(json!({"n": 2}))).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.length().await, Some(0));
    }

    #[tokio::test]
    async fn clear_on_fresh_store_skips_lazy_sync() {
        let (table, store) = store_with(StoreOptions::default());
        store.clear().await.unwrap();
        assert_eq!(store.length().await, Some(0));
        assert_eq!(table.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_first_calls_sync_once() {
        let (table, store) = store_with(StoreOptions::default());
        let store = Arc::new(store);

        let callers: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        store.length().await.is_some()
                    } else {
                        store.get(&format!("sid-{i}")).await.is_ok()
                    }
                })
            })
            .collect();

        for caller in callers {
            assert!(caller.await.unwrap());
        }
        assert_eq!(table.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn initialization_failure_fails_fast_then_retries() {
        let (table, store) = store_with(StoreOptions::default());
        table.fail_sync.store(true, Ordering::SeqCst);

        let error = store.get("a").await.unwrap_err();
        assert!(error.is_initialization());
        assert!(store.set("a", &Session::new()).await.unwrap_err().is_initialization());
        assert!(store.destroy("a").await.unwrap_err().is_initialization());
        assert_eq!(store.length().await, None);
        assert_eq!(table.syncs.load(Ordering::SeqCst), 4);

        table.fail_sync.store(false, Ordering::SeqCst);
        assert!(store.get("a").await.unwrap().is_empty());
        assert_eq!(table.syncs.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn query_failures_propagate_but_length_degrades() {
        let (table, store) = store_with(StoreOptions::default());
        store.length().await.unwrap();
        table.fail_queries.store(true, Ordering::SeqCst);

        assert!(matches!(store.get("a").await, Err(StoreError::Query(_))));
        assert!(matches!(
            store.set("a", &Session::new()).await,
            Err(StoreError::Query(_))
        ));
        assert!(matches!(store.destroy("a").await, Err(StoreError::Query(_))));
        assert_eq!(store.length().await, None);
    }

    #[tokio::test]
    async fn sweep_removes_only_stale_sessions() {
        let (table, store) = store_with(StoreOptions {
            default_expiration: Duration::from_secs(100),
            ..StoreOptions::default()
        });
        store.set("fresh", &session(json!({"n": 1}))).await.unwrap();
        table
            .inner
            .create(&SessionRecord {
                id: "stale".into(),
                last_activity: now_secs() - 101,
                payload: "{}".into(),
            })
            .await
            .unwrap();

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert_eq!(store.sweep_expired().await.unwrap(), 0);
        assert!(store.get("stale").await.unwrap().is_empty());
        assert!(!store.get("fresh").await.unwrap().is_empty());
    }
}
