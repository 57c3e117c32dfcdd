//! 脚本化 Oracle（用于测试与离线运行，无需 LLM）
//!
//! 规划时返回预置计划；重规划按脚本依次给出决策，脚本用完后沿用当前剩余计划
//! （剩余为空则 Finish）；同时记录每次调用看到的历史长度，便于断言。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{PastStep, Target};
use crate::planning::{
    PlanRequest, PlanningOracle, ProposedStep, ReplanDecision, ReplanRequest, ReplanningOracle,
    SummaryGenerator,
};

pub struct ScriptedOracle {
    plan: Vec<ProposedStep>,
    replans: Mutex<VecDeque<Result<ReplanDecision, String>>>,
    report: String,
    plan_calls: AtomicUsize,
    replan_history_lens: Mutex<Vec<usize>>,
    summary_calls: Mutex<Vec<Vec<PastStep>>>,
}

impl ScriptedOracle {
    pub fn new(plan: Vec<ProposedStep>) -> Self {
        Self {
            plan,
            replans: Mutex::new(VecDeque::new()),
            report: "Run finished.".to_string(),
            plan_calls: AtomicUsize::new(0),
            replan_history_lens: Mutex::new(Vec::new()),
            summary_calls: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条重规划决策
    pub fn then_replan(self, decision: ReplanDecision) -> Self {
        self.lock_replans().push_back(Ok(decision));
        self
    }

    /// 追加一次重规划失败
    pub fn then_fail(self, error: impl Into<String>) -> Self {
        self.lock_replans().push_back(Err(error.into()));
        self
    }

    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = report.into();
        self
    }

    pub fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }

    /// 每次重规划调用时收到的历史条数
    pub fn replan_history_lens(&self) -> Vec<usize> {
        self.replan_history_lens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn replan_calls(&self) -> usize {
        self.replan_history_lens().len()
    }

    /// 每次总结调用时收到的历史
    pub fn summary_calls(&self) -> Vec<Vec<PastStep>> {
        self.summary_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_replans(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<ReplanDecision, String>>> {
        self.replans.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PlanningOracle for ScriptedOracle {
    async fn plan(&self, _request: PlanRequest<'_>) -> Result<Vec<ProposedStep>, String> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.plan.clone())
    }
}

#[async_trait]
impl ReplanningOracle for ScriptedOracle {
    async fn replan(&self, request: ReplanRequest<'_>) -> Result<ReplanDecision, String> {
        self.replan_history_lens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.history.len());
        if let Some(next) = self.lock_replans().pop_front() {
            return next;
        }
        if request.current_plan.is_empty() {
            return Ok(ReplanDecision::Finish);
        }
        Ok(ReplanDecision::Continue(
            request
                .current_plan
                .steps()
                .map(|s| {
                    let worker = match &s.worker {
                        Target::Worker(name) => name.to_string(),
                        Target::Finish => crate::core::FINISH.to_string(),
                    };
                    ProposedStep::new(worker, s.task.clone(), s.stopping_criterion.clone())
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl SummaryGenerator for ScriptedOracle {
    async fn summarize(&self, _goal: &str, history: &[PastStep]) -> Result<String, String> {
        self.summary_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(history.to_vec());
        Ok(self.report.clone())
    }
}
