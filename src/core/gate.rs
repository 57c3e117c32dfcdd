//! 派发闸门：全局至多一个在途步骤
//!
//! Worker 可能修改共享资源（如同一份配置文件），编排器本身不对这些资源加锁，
//! 只靠顺序派发保证单写者。即使 Worker 调用是异步的，也必须先拿到这里唯一的许可。
//! 另外记录正在被驱动的运行，防止同一运行被两个任务同时推进。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::OrchestratorError;

#[derive(Clone)]
pub struct StepGate {
    in_flight: Arc<Semaphore>,
    active_runs: Arc<Mutex<HashSet<String>>>,
}

impl StepGate {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Semaphore::new(1)),
            active_runs: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 获取唯一的派发许可；许可在 Worker 返回后释放
    pub async fn acquire_step(&self) -> Result<OwnedSemaphorePermit, OrchestratorError> {
        self.in_flight
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| OrchestratorError::TaskFailed(format!("step gate closed: {e}")))
    }

    /// 声明驱动某个运行；已被驱动时返回 RunBusy
    pub fn claim_run(&self, run_id: &str) -> Result<RunClaim, OrchestratorError> {
        let mut active = self.active_runs.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(run_id.to_string()) {
            return Err(OrchestratorError::RunBusy(run_id.to_string()));
        }
        Ok(RunClaim {
            run_id: run_id.to_string(),
            active_runs: Arc::clone(&self.active_runs),
        })
    }

    pub fn is_active(&self, run_id: &str) -> bool {
        self.active_runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(run_id)
    }
}

impl Default for StepGate {
    fn default() -> Self {
        Self::new()
    }
}

/// 运行占用凭证；drop 时释放
pub struct RunClaim {
    run_id: String,
    active_runs: Arc<Mutex<HashSet<String>>>,
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.active_runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.run_id);
    }
}
