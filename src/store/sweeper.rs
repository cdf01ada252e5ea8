use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::SweepableStore;

/// 后台过期清理任务句柄，丢弃时停止任务
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 启动过期会话清理任务
///
/// 第一次清理在一个间隔之后执行。单次失败只记录日志，下一次照常执行。
pub fn spawn_sweeper<S>(store: Arc<S>, period: std::time::Duration) -> SweeperHandle
where
    S: SweepableStore + 'static,
{
    // interval 不接受 0
    let period = period.max(std::time::Duration::from_millis(1));
    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.sweep_expired().await {
                Ok(0) => tracing::debug!("No expired sessions to remove"),
                Ok(removed) => tracing::info!(removed, "Removed expired sessions"),
                // 失败原因已在发生处记录
                Err(_) => tracing::debug!("Expired session sweep skipped"),
            }
        }
    });

    SweeperHandle { task }
}
