//! Oracle 接口：规划、重规划、总结
//!
//! 推理本身在外部（LLM 或测试桩）；这里只定义输入输出契约。
//! Oracle 给出的是草稿步骤（Worker 名仍是字符串），由 Planner / Replanner 经注册表校验后才成为 Step。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{PastStep, Plan, WorkerDescriptor};

/// Oracle 产出的草稿步骤
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedStep {
    #[serde(alias = "agent")]
    pub worker: String,
    pub task: String,
    #[serde(default, alias = "stopping_criteria")]
    pub stopping_criterion: String,
}

impl ProposedStep {
    pub fn new(
        worker: impl Into<String>,
        task: impl Into<String>,
        stopping_criterion: impl Into<String>,
    ) -> Self {
        Self {
            worker: worker.into(),
            task: task.into(),
            stopping_criterion: stopping_criterion.into(),
        }
    }
}

/// 规划输入
#[derive(Clone, Copy, Debug)]
pub struct PlanRequest<'a> {
    pub goal: &'a str,
    pub workers: &'a [WorkerDescriptor],
}

/// 重规划输入：必须携带完整历史，而不只是最近一步
#[derive(Clone, Copy, Debug)]
pub struct ReplanRequest<'a> {
    pub goal: &'a str,
    pub current_plan: &'a Plan,
    pub history: &'a [PastStep],
    pub workers: &'a [WorkerDescriptor],
}

/// 重规划决策
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplanDecision {
    Finish,
    /// 新计划整体替换剩余计划；不得包含已执行过的步骤
    Continue(Vec<ProposedStep>),
}

#[async_trait]
pub trait PlanningOracle: Send + Sync {
    /// 可返回空计划（目标已满足）
    async fn plan(&self, request: PlanRequest<'_>) -> Result<Vec<ProposedStep>, String>;
}

#[async_trait]
pub trait ReplanningOracle: Send + Sync {
    async fn replan(&self, request: ReplanRequest<'_>) -> Result<ReplanDecision, String>;
}

#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn summarize(&self, goal: &str, history: &[PastStep]) -> Result<String, String>;
}
