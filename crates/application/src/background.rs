//! 后台任务执行器
//!
//! 自动审批、结果提取、审批完成检查与引擎状态监控都以具名任务提交到这里。
//! 任务失败只记录日志，不向调用方传播；`wait_idle` 让测试与停机流程能确定地等待全部任务结束。

use portal_errors::PortalResult;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<(String, JoinHandle<()>)>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, Vec<(String, JoinHandle<()>)>> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 提交一个具名后台任务
    pub fn spawn<F>(&self, name: impl Into<String>, future: F)
    where
        F: Future<Output = PortalResult<()>> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            match future.await {
                Ok(()) => debug!("后台任务完成: {}", task_name),
                Err(e) => error!("后台任务 {} 执行失败: {}", task_name, e),
            }
        });

        let mut handles = self.handles();
        handles.retain(|(_, handle)| !handle.is_finished());
        handles.push((name, handle));
    }

    /// 未结束的任务数
    pub fn pending_count(&self) -> usize {
        self.handles()
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// 等待所有任务结束，包括等待期间新提交的任务
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<_> = self.handles().drain(..).collect();
            if pending.is_empty() {
                break;
            }
            for (name, handle) in pending {
                if let Err(e) = handle.await {
                    if !e.is_cancelled() {
                        error!("后台任务 {} 异常退出: {}", name, e);
                    }
                }
            }
        }
    }

    /// 中止所有未结束的任务
    pub fn shutdown(&self) {
        let pending: Vec<_> = self.handles().drain(..).collect();
        for (name, handle) in pending {
            if !handle.is_finished() {
                warn!("中止后台任务: {}", name);
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_errors::PortalError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_idle_covers_nested_tasks() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_tasks = tasks.clone();
        let inner_counter = counter.clone();
        tasks.spawn("outer", async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            inner_tasks.spawn("inner", async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                inner_counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        tasks.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_does_not_propagate() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("failing", async { Err(PortalError::Internal("boom".to_string())) });
        tasks.wait_idle().await;
        assert_eq!(tasks.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_pending_work() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let task_counter = counter.clone();
        tasks.spawn("slow", async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            task_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tasks.shutdown();
        tasks.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
