//! 编排器：plan → route → invoke → replan 主循环
//!
//! 每个运行由一个后台任务驱动，通过 RunHandle 向调用方推送 RunEvent。
//! 所有运行共享同一个 StepGate，任意时刻至多一个 Worker 调用在途。
//! 每次状态变化后写检查点；挂起时任务结束，resume / recover 从检查点继续。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::checkpoint::CheckpointStore;
use crate::core::events::RunEvent;
use crate::core::gate::{RunClaim, StepGate};
use crate::core::router::{route, RouteDecision};
use crate::core::{
    ExecutionState, OrchestratorError, PlanningContractError, SuspensionToken, TerminationReason,
    WorkerRegistry,
};
use crate::memory::Message;
use crate::planning::{
    PlanningOracle, Planner, ReplanOutcome, Replanner, ReplanningOracle, Summarizer,
    SummaryGenerator,
};
use crate::workers::{StepOutcome, WorkerExecutor, WorkerRequest};

/// 编排参数（来自 `[orchestrator]` 配置段）
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// 重规划次数上限；None 表示不限
    pub max_replans: Option<usize>,
    pub worker_timeout_secs: u64,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_replans: None,
            worker_timeout_secs: 300,
        }
    }
}

/// 一次驱动的结局：运行结束，或在某一步挂起等待回答
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        report: String,
        reason: TerminationReason,
    },
    Suspended {
        token: SuspensionToken,
        question: String,
    },
}

type EventTx = mpsc::UnboundedSender<RunEvent>;

/// 正在驱动的运行：事件流 + 后台任务
pub struct RunHandle {
    run_id: String,
    events: mpsc::UnboundedReceiver<RunEvent>,
    task: JoinHandle<Result<RunOutcome, OrchestratorError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// 下一个事件；任务结束且事件取尽后返回 None
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    pub async fn wait(self) -> Result<RunOutcome, OrchestratorError> {
        self.task
            .await
            .map_err(|e| OrchestratorError::TaskFailed(e.to_string()))?
    }

    /// 取尽事件后等待结局
    pub async fn collect(mut self) -> (Vec<RunEvent>, Result<RunOutcome, OrchestratorError>) {
        let mut events = Vec::new();
        while let Some(ev) = self.events.recv().await {
            events.push(ev);
        }
        (events, self.wait().await)
    }
}

pub struct Orchestrator {
    registry: Arc<WorkerRegistry>,
    planner: Planner,
    replanner: Replanner,
    summarizer: Summarizer,
    executor: WorkerExecutor,
    store: Arc<dyn CheckpointStore>,
    gate: StepGate,
}

impl Orchestrator {
    pub fn new(
        registry: WorkerRegistry,
        planning: Arc<dyn PlanningOracle>,
        replanning: Arc<dyn ReplanningOracle>,
        summary: Arc<dyn SummaryGenerator>,
        store: Arc<dyn CheckpointStore>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            planner: Planner::new(planning),
            replanner: Replanner::new(replanning, options.max_replans),
            summarizer: Summarizer::new(summary),
            executor: WorkerExecutor::new(options.worker_timeout_secs),
            store,
            gate: StepGate::new(),
        }
    }

    /// 同一个 Oracle 同时承担规划、重规划与总结
    pub fn with_oracle<O>(
        registry: WorkerRegistry,
        oracle: Arc<O>,
        store: Arc<dyn CheckpointStore>,
        options: OrchestratorOptions,
    ) -> Self
    where
        O: PlanningOracle + ReplanningOracle + SummaryGenerator + 'static,
    {
        Self::new(
            registry,
            oracle.clone(),
            oracle.clone(),
            oracle,
            store,
            options,
        )
    }

    /// 读取某个运行的检查点
    pub async fn state(&self, run_id: &str) -> Result<ExecutionState, OrchestratorError> {
        self.store
            .load(run_id)
            .await?
            .ok_or_else(|| OrchestratorError::RunNotFound(run_id.to_string()))
    }

    pub async fn list_runs(&self) -> Result<Vec<String>, OrchestratorError> {
        self.store.list().await
    }

    /// 以新目标开始一个运行
    pub fn start_run(self: &Arc<Self>, goal: impl Into<String>) -> RunHandle {
        let state = ExecutionState::new(goal);
        tracing::info!(run_id = %state.run_id(), goal = %state.goal(), "run started");
        match self.gate.claim_run(state.run_id()) {
            Ok(claim) => self.spawn_drive(state, claim, None),
            Err(e) => RunHandle::failed(state.run_id().to_string(), e),
        }
    }

    /// 用挂起令牌回答问题并继续运行
    ///
    /// 令牌只能消费一次：重复提交返回 TokenConsumed 且不改变任何状态。
    pub async fn resume(
        self: &Arc<Self>,
        token: &SuspensionToken,
        answer: impl Into<String>,
    ) -> Result<RunHandle, OrchestratorError> {
        let run_id = token.run_id().to_string();
        validate_resume(&self.state(&run_id).await?, token)?;

        let claim = self.gate.claim_run(&run_id)?;
        // 拿到占用后重新读取，避免与刚结束的驱动任务竞争
        let mut state = self.state(&run_id).await?;
        validate_resume(&state, token)?;

        let answer = answer.into();
        state.accept_answer(token, answer.clone())?;
        self.checkpoint(&mut state).await?;
        tracing::info!(run_id = %run_id, token = %token, "resume accepted");

        Ok(self.spawn_drive(state, claim, Some(answer)))
    }

    /// 从检查点继续：已完成的运行直接给出已有报告，挂起的运行重新给出同一问题，
    /// 派发中的步骤重新派发（至少一次）
    pub async fn recover(self: &Arc<Self>, run_id: &str) -> Result<RunHandle, OrchestratorError> {
        let claim = self.gate.claim_run(run_id)?;
        let state = self.state(run_id).await?;
        tracing::info!(run_id = %run_id, "recovering run from checkpoint");
        Ok(self.spawn_drive(state, claim, None))
    }

    fn spawn_drive(
        self: &Arc<Self>,
        mut state: ExecutionState,
        claim: RunClaim,
        answer: Option<String>,
    ) -> RunHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let run_id = state.run_id().to_string();
        let this = Arc::clone(self);

        let task = tokio::spawn(async move {
            let result = this.drive(&mut state, answer, &tx).await;
            if let Err(e) = &result {
                tracing::error!(run_id = %state.run_id(), error = %e, "run stopped");
                if let Err(save_err) = this.checkpoint(&mut state).await {
                    tracing::warn!(run_id = %state.run_id(), error = %save_err, "failed to checkpoint stopped run");
                }
            }
            // 先释放占用再发出终结事件，收到事件的调用方可以立即 resume
            drop(claim);
            let event = match &result {
                Ok(RunOutcome::Completed { report, reason }) => RunEvent::Completed {
                    report: report.clone(),
                    reason: *reason,
                },
                Ok(RunOutcome::Suspended { token, question }) => RunEvent::Suspended {
                    token: token.clone(),
                    question: question.clone(),
                },
                Err(e) => RunEvent::Failed {
                    error: e.to_string(),
                },
            };
            let _ = tx.send(event);
            result
        });

        RunHandle {
            run_id,
            events: rx,
            task,
        }
    }

    async fn checkpoint(&self, state: &mut ExecutionState) -> Result<(), OrchestratorError> {
        state.touch();
        self.store.save(state).await
    }

    async fn drive(
        &self,
        state: &mut ExecutionState,
        mut answer: Option<String>,
        tx: &EventTx,
    ) -> Result<RunOutcome, OrchestratorError> {
        if let Some(report) = state.report() {
            return Ok(RunOutcome::Completed {
                report: report.to_string(),
                reason: state
                    .termination()
                    .unwrap_or(TerminationReason::PlanExhausted),
            });
        }

        if !state.is_planned() {
            self.checkpoint(state).await?;
            let plan = self.planner.plan(state.goal(), &self.registry).await?;
            let steps = plan.to_vec();
            state.install_plan(plan);
            self.checkpoint(state).await?;
            tracing::info!(run_id = %state.run_id(), steps = steps.len(), "plan installed");
            let _ = tx.send(RunEvent::Planned { steps });
        }

        loop {
            if state.awaiting_replan() {
                self.apply_replan(state, tx).await?;
            }

            let in_flight = match state.in_flight() {
                Some(step) => {
                    if let Some(pending) = &step.suspension {
                        tracing::info!(run_id = %state.run_id(), token = %pending.token, "run is still suspended");
                        return Ok(RunOutcome::Suspended {
                            token: pending.token.clone(),
                            question: pending.question.clone(),
                        });
                    }
                    if answer.is_none() {
                        tracing::info!(run_id = %state.run_id(), worker = %step.worker, "re-dispatching in-flight step");
                        let _ = tx.send(RunEvent::Dispatching { step: step.step() });
                        // 已接受的回答尚未交给 Worker：重新派发走 resume
                        answer = step.answers.last().map(|a| a.answer.clone());
                    }
                    step.clone()
                }
                None => match route(state) {
                    RouteDecision::Terminate(reason) => return self.finish(state, reason).await,
                    RouteDecision::Dispatch(step) => {
                        self.checkpoint(state).await?;
                        let _ = tx.send(RunEvent::Dispatching { step });
                        match state.in_flight() {
                            Some(step) => step.clone(),
                            None => continue,
                        }
                    }
                },
            };

            let worker = self.registry.get(&in_flight.worker).ok_or_else(|| {
                PlanningContractError::UnknownWorker(in_flight.worker.to_string())
            })?;
            let request = WorkerRequest {
                task: in_flight.task.clone(),
                stopping_criterion: in_flight.stopping_criterion.clone(),
                context: state.messages().messages().to_vec(),
                answers: in_flight.answers.clone(),
            };

            tracing::info!(run_id = %state.run_id(), worker = %in_flight.worker, "dispatching step");
            let outcome = {
                let _permit = self.gate.acquire_step().await?;
                self.executor
                    .run(worker.as_ref(), &request, answer.take().as_deref())
                    .await
            };

            match outcome {
                StepOutcome::Suspended { question } => {
                    let token = state.suspend(question.clone()).ok_or_else(|| {
                        OrchestratorError::NotSuspended(state.run_id().to_string())
                    })?;
                    self.checkpoint(state).await?;
                    tracing::info!(run_id = %state.run_id(), worker = %in_flight.worker, token = %token, "step suspended");
                    return Ok(RunOutcome::Suspended { token, question });
                }
                StepOutcome::Completed { result, messages } => {
                    let messages = if messages.is_empty() {
                        vec![Message::assistant(result.summary.clone())
                            .with_name(in_flight.worker.to_string())]
                    } else {
                        messages
                    };
                    let Some(past) = state.complete_step(result) else {
                        continue;
                    };
                    state.append_messages(messages);
                    self.checkpoint(state).await?;
                    tracing::info!(
                        run_id = %state.run_id(),
                        worker = %past.worker,
                        status = past.status,
                        "step completed"
                    );
                    let _ = tx.send(RunEvent::StepCompleted { step: past });
                }
            }
        }
    }

    async fn apply_replan(
        &self,
        state: &mut ExecutionState,
        tx: &EventTx,
    ) -> Result<(), OrchestratorError> {
        match self.replanner.replan(state, &self.registry).await? {
            ReplanOutcome::Finish => state.terminate(TerminationReason::Finished),
            ReplanOutcome::BudgetExceeded => state.terminate(TerminationReason::BudgetExceeded),
            ReplanOutcome::Continue(plan) => {
                let steps = plan.to_vec();
                state.replace_plan(plan);
                let _ = tx.send(RunEvent::Replanned { plan: steps });
            }
        }
        state.replan_applied();
        self.checkpoint(state).await
    }

    /// 运行终止：总结只调用一次，报告随检查点保存
    async fn finish(
        &self,
        state: &mut ExecutionState,
        reason: TerminationReason,
    ) -> Result<RunOutcome, OrchestratorError> {
        let report = self
            .summarizer
            .report(state.goal(), state.history(), reason)
            .await?;
        state.set_report(report.clone());
        self.checkpoint(state).await?;
        tracing::info!(
            run_id = %state.run_id(),
            reason = ?reason,
            steps = state.history().len(),
            "run completed"
        );
        Ok(RunOutcome::Completed { report, reason })
    }
}

fn validate_resume(state: &ExecutionState, token: &SuspensionToken) -> Result<(), OrchestratorError> {
    match state.check_token(token) {
        Ok(_) => Ok(()),
        Err(OrchestratorError::NotSuspended(run_id)) if state.is_terminated() => {
            Err(OrchestratorError::RunAlreadyCompleted(run_id))
        }
        Err(e) => Err(e),
    }
}

impl RunHandle {
    fn failed(run_id: String, error: OrchestratorError) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let _ = tx.send(RunEvent::Failed {
                error: error.to_string(),
            });
            Err(error)
        });
        Self {
            run_id,
            events: rx,
            task,
        }
    }
}
