//! 单次初始化闸门
//!
//! 进程内第一次调用触发表结构同步；同步进行中的并发调用共享同一次
//! 尝试的结果。成功后永久就绪，失败后回到未初始化状态，下一次调用重试。

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::Mutex;

use crate::error::StoreError;

type SyncAttempt = Shared<BoxFuture<'static, Result<(), Arc<sqlx::Error>>>>;

enum GateState {
    Pending,
    Syncing(SyncAttempt),
    Ready,
}

pub struct InitGate {
    state: Mutex<GateState>,
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InitGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending),
        }
    }

    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.lock().await, GateState::Ready)
    }

    /// 确保初始化完成
    ///
    /// 只有在没有进行中的尝试时才会调用 `start`。
    pub async fn ensure_ready<F>(&self, start: F) -> Result<(), StoreError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), sqlx::Error>>,
    {
        let attempt = {
            let mut state = self.state.lock().await;
            let in_flight = match &*state {
                GateState::Ready => return Ok(()),
                GateState::Syncing(attempt) => Some(attempt.clone()),
                GateState::Pending => None,
            };
            match in_flight {
                Some(attempt) => attempt,
                None => {
                    let attempt = start()
                        .map(|result| {
                            result.map_err(|e| {
                                tracing::error!(error = %e, "Failed to initialize session store");
                                Arc::new(e)
                            })
                        })
                        .boxed()
                        .shared();
                    *state = GateState::Syncing(attempt.clone());
                    attempt
                }
            }
        };

        let outcome = attempt.clone().await;

        // 只处理自己等待的那次尝试，后续发起的尝试由其自身的等待者收尾
        let mut state = self.state.lock().await;
        let owns_attempt =
            matches!(&*state, GateState::Syncing(current) if current.ptr_eq(&attempt));
        if owns_attempt {
            *state = if outcome.is_ok() {
                GateState::Ready
            } else {
                GateState::Pending
            };
        }

        outcome.map_err(StoreError::Initialization)
    }

    /// 表结构已由其他途径建立（例如 `clear`）
    pub async fn mark_ready(&self) {
        *self.state.lock().await = GateState::Ready;
    }
}
