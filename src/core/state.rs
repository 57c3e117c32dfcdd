//! 执行状态：Plan / Step / PastStep 与贯穿整个运行的 ExecutionState
//!
//! ExecutionState 只由编排循环持有和修改；PastStep 只追加不修改，顺序即派发顺序。
//! 整个结构可序列化，作为检查点落盘，使挂起能跨进程重启。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::registry::{Target, WorkerName};
use crate::core::suspension::{PendingSuspension, SuspensionToken};
use crate::core::OrchestratorError;
use crate::memory::{Message, MessageLog};
use crate::workers::HumanExchange;

/// 单个计划步骤；由 Oracle 产出并经注册表校验，创建后不可变
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub worker: Target,
    pub task: String,
    pub stopping_criterion: String,
}

/// 按执行顺序排列的待执行步骤（FIFO）；空计划表示没有后续工作
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    steps: VecDeque<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    pub fn to_vec(&self) -> Vec<Step> {
        self.steps.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Worker 返回的结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastStepResult {
    pub summary: String,
    pub status: bool,
}

/// 已完成步骤的日志条目
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastStep {
    pub worker: WorkerName,
    /// 执行时的任务文本，用于检测重规划是否重复了已完成步骤
    pub task: String,
    pub summary: String,
    pub status: bool,
    pub completed_at: i64,
}

/// 运行终止原因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// 计划已空
    PlanExhausted,
    /// 重规划 Oracle 返回 Finish
    Finished,
    /// 计划中出现 FINISH 步骤
    FinishStep,
    /// 超出重规划次数上限
    BudgetExceeded,
}

/// 正在执行（或挂起中）的步骤
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlightStep {
    pub worker: WorkerName,
    pub task: String,
    pub stopping_criterion: String,
    pub answers: Vec<HumanExchange>,
    pub suspension: Option<PendingSuspension>,
}

impl InFlightStep {
    pub fn step(&self) -> Step {
        Step {
            worker: Target::Worker(self.worker.clone()),
            task: self.task.clone(),
            stopping_criterion: self.stopping_criterion.clone(),
        }
    }
}

/// 整个运行的可变记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionState {
    run_id: String,
    goal: String,
    plan: Plan,
    history: Vec<PastStep>,
    messages: MessageLog,
    in_flight: Option<InFlightStep>,
    consumed_tokens: Vec<SuspensionToken>,
    planned: bool,
    /// 最近一步已完成但尚未重规划
    awaiting_replan: bool,
    replans: usize,
    dispatches: usize,
    termination: Option<TerminationReason>,
    report: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl ExecutionState {
    pub fn new(goal: impl Into<String>) -> Self {
        let goal = goal.into();
        let now = chrono::Utc::now().timestamp_millis();
        let mut messages = MessageLog::new();
        messages.push(Message::user(goal.clone()));
        Self {
            run_id: format!("run_{}", uuid::Uuid::new_v4().simple()),
            goal,
            plan: Plan::empty(),
            history: Vec::new(),
            messages,
            in_flight: None,
            consumed_tokens: Vec::new(),
            planned: false,
            awaiting_replan: false,
            replans: 0,
            dispatches: 0,
            termination: None,
            report: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn history(&self) -> &[PastStep] {
        &self.history
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn in_flight(&self) -> Option<&InFlightStep> {
        self.in_flight.as_ref()
    }

    pub fn pending_suspension(&self) -> Option<&PendingSuspension> {
        self.in_flight.as_ref().and_then(|s| s.suspension.as_ref())
    }

    pub fn is_planned(&self) -> bool {
        self.planned
    }

    pub fn awaiting_replan(&self) -> bool {
        self.awaiting_replan
    }

    pub fn replans(&self) -> usize {
        self.replans
    }

    /// 已开始的派发次数（含正在执行的那一步）
    pub fn dispatches(&self) -> usize {
        self.dispatches
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    pub(crate) fn install_plan(&mut self, plan: Plan) {
        self.plan = plan;
        self.planned = true;
    }

    /// 整体替换剩余计划（不是追加）
    pub(crate) fn replace_plan(&mut self, plan: Plan) {
        self.plan = plan;
        self.replans += 1;
    }

    pub(crate) fn replan_applied(&mut self) {
        self.awaiting_replan = false;
    }

    pub(crate) fn pop_step(&mut self) -> Option<Step> {
        self.plan.pop_front()
    }

    pub(crate) fn begin_step(&mut self, worker: WorkerName, step: &Step) {
        self.in_flight = Some(InFlightStep {
            worker,
            task: step.task.clone(),
            stopping_criterion: step.stopping_criterion.clone(),
            answers: Vec::new(),
            suspension: None,
        });
        self.dispatches += 1;
    }

    /// 挂起当前步骤，返回新令牌；没有在执行的步骤时返回 None
    pub(crate) fn suspend(&mut self, question: impl Into<String>) -> Option<SuspensionToken> {
        let run_id = self.run_id.clone();
        let step = self.in_flight.as_mut()?;
        let token = SuspensionToken::new(run_id);
        step.suspension = Some(PendingSuspension {
            token: token.clone(),
            question: question.into(),
        });
        Some(token)
    }

    /// 校验令牌，不修改状态
    pub fn check_token(&self, token: &SuspensionToken) -> Result<&PendingSuspension, OrchestratorError> {
        if self.consumed_tokens.contains(token) {
            return Err(OrchestratorError::TokenConsumed(token.clone()));
        }
        let pending = self
            .pending_suspension()
            .ok_or_else(|| OrchestratorError::NotSuspended(self.run_id.clone()))?;
        if &pending.token != token {
            return Err(OrchestratorError::TokenMismatch {
                run_id: self.run_id.clone(),
                token: token.clone(),
            });
        }
        Ok(pending)
    }

    /// 消费令牌并把回答并入当前步骤；校验失败时状态不变
    pub(crate) fn accept_answer(
        &mut self,
        token: &SuspensionToken,
        answer: impl Into<String>,
    ) -> Result<(), OrchestratorError> {
        let question = self.check_token(token)?.question.clone();
        if let Some(step) = self.in_flight.as_mut() {
            step.suspension = None;
            step.answers.push(HumanExchange {
                question,
                answer: answer.into(),
            });
        }
        self.consumed_tokens.push(token.clone());
        Ok(())
    }

    /// 结束当前步骤：追加 PastStep 并清空在途指针
    pub(crate) fn complete_step(&mut self, result: PastStepResult) -> Option<PastStep> {
        let step = self.in_flight.take()?;
        let past = PastStep {
            worker: step.worker,
            task: step.task,
            summary: result.summary,
            status: result.status,
            completed_at: chrono::Utc::now().timestamp_millis(),
        };
        self.history.push(past.clone());
        self.awaiting_replan = true;
        Some(past)
    }

    pub(crate) fn append_messages(&mut self, msgs: impl IntoIterator<Item = Message>) {
        self.messages.extend(msgs);
    }

    pub(crate) fn terminate(&mut self, reason: TerminationReason) {
        if self.termination.is_none() {
            self.termination = Some(reason);
        }
    }

    pub(crate) fn set_report(&mut self, report: String) {
        self.report = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(worker: &str, task: &str) -> Step {
        Step {
            worker: Target::Worker(WorkerName::new(worker)),
            task: task.into(),
            stopping_criterion: "done".into(),
        }
    }

    #[test]
    fn test_new_state_seeds_goal_message() {
        let state = ExecutionState::new("edit the config");
        assert!(state.run_id().starts_with("run_"));
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages().messages()[0].content, "edit the config");
        assert!(!state.is_planned());
    }

    #[test]
    fn test_replace_plan_replaces_instead_of_appending() {
        let mut state = ExecutionState::new("g");
        state.install_plan(Plan::new(vec![step("a", "1"), step("b", "2")]));
        state.replace_plan(Plan::new(vec![step("c", "3")]));
        assert_eq!(state.plan().len(), 1);
        assert_eq!(state.replans(), 1);
    }

    #[test]
    fn test_suspend_and_accept_answer_consumes_token_once() {
        let mut state = ExecutionState::new("g");
        let s = step("a", "1");
        state.begin_step(WorkerName::new("a"), &s);
        let token = state.suspend("confirm X?").unwrap();

        state.accept_answer(&token, "yes").unwrap();
        let in_flight = state.in_flight().unwrap();
        assert!(in_flight.suspension.is_none());
        assert_eq!(in_flight.answers[0].answer, "yes");

        let first = state.accept_answer(&token, "again").unwrap_err().to_string();
        let second = state.accept_answer(&token, "again").unwrap_err().to_string();
        assert_eq!(first, second);
        assert_eq!(state.in_flight().unwrap().answers.len(), 1);
    }

    #[test]
    fn test_foreign_token_is_mismatch() {
        let mut state = ExecutionState::new("g");
        state.begin_step(WorkerName::new("a"), &step("a", "1"));
        state.suspend("q").unwrap();

        let foreign = SuspensionToken::new("run_other");
        assert!(matches!(
            state.accept_answer(&foreign, "x"),
            Err(OrchestratorError::TokenMismatch { .. })
        ));
        assert!(state.pending_suspension().is_some());
    }

    #[test]
    fn test_complete_step_appends_history() {
        let mut state = ExecutionState::new("g");
        state.begin_step(WorkerName::new("a"), &step("a", "1"));
        let past = state
            .complete_step(PastStepResult {
                summary: "ok".into(),
                status: true,
            })
            .unwrap();
        assert_eq!(past.worker.as_str(), "a");
        assert_eq!(state.history().len(), state.dispatches());
        assert!(state.in_flight().is_none());
        assert!(state.awaiting_replan());
    }
}
