//! 编排错误类型
//!
//! 三类错误分开处理：Worker 失败在执行器内折叠为失败的 PastStep，不会出现在这里；
//! Oracle 契约违规与挂起令牌误用直接返回给调用方，不自动重试。

use thiserror::Error;

use crate::core::suspension::SuspensionToken;

/// Oracle 输出违反契约（引用未注册的 Worker、重复已执行的步骤）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningContractError {
    #[error("Unknown worker in plan: {0}")]
    UnknownWorker(String),

    #[error("Replanned step repeats a completed step: {worker} / {task}")]
    RepeatsCompletedStep { worker: String, task: String },
}

/// 编排器对外暴露的错误
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Planning contract violated: {0}")]
    PlanningContract(#[from] PlanningContractError),

    #[error("Oracle error: {0}")]
    Oracle(String),

    /// 令牌与该运行当前挂起的步骤不匹配（过期令牌或来自其他运行）
    #[error("Suspension token mismatch for run {run_id}: {token}")]
    TokenMismatch { run_id: String, token: SuspensionToken },

    /// 令牌已被消费过一次
    #[error("Suspension token already consumed: {0}")]
    TokenConsumed(SuspensionToken),

    #[error("Run {0} is not suspended")]
    NotSuspended(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// 同一运行已有任务在驱动
    #[error("Run {0} is already being driven")]
    RunBusy(String),

    #[error("Run {0} has already completed")]
    RunAlreadyCompleted(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 驱动运行的后台任务异常退出
    #[error("Run task failed: {0}")]
    TaskFailed(String),
}

/// 单个 Worker 调用的失败；由 WorkerExecutor 折叠为 status=false 的 PastStep
#[derive(Error, Debug, Clone)]
pub enum WorkerError {
    #[error("Worker failed: {0}")]
    Failed(String),

    #[error("Invalid worker response: {0}")]
    InvalidResponse(String),

    #[error("Worker timed out after {0}s")]
    Timeout(u64),

    #[error("Worker panicked: {0}")]
    Panicked(String),

    #[error("LLM error: {0}")]
    Llm(String),
}
