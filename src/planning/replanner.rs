//! Replanner：每个 Worker 步骤完成后调用一次重规划 Oracle
//!
//! 新计划整体替换剩余计划。新计划中 `(worker, task)` 与历史中任一步相同视为契约违规；
//! 可选的重规划次数上限耗尽后给出 BudgetExceeded。

use std::sync::Arc;

use crate::core::{
    ExecutionState, OrchestratorError, Plan, PlanningContractError, Target, WorkerRegistry,
};
use crate::planning::{validate_steps, ReplanDecision, ReplanRequest, ReplanningOracle};

/// 重规划结果（由编排器落到状态上）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplanOutcome {
    Finish,
    Continue(Plan),
    BudgetExceeded,
}

pub struct Replanner {
    oracle: Arc<dyn ReplanningOracle>,
    max_replans: Option<usize>,
}

impl Replanner {
    pub fn new(oracle: Arc<dyn ReplanningOracle>, max_replans: Option<usize>) -> Self {
        Self { oracle, max_replans }
    }

    pub async fn replan(
        &self,
        state: &ExecutionState,
        registry: &WorkerRegistry,
    ) -> Result<ReplanOutcome, OrchestratorError> {
        let workers = registry.descriptors();
        let decision = self
            .oracle
            .replan(ReplanRequest {
                goal: state.goal(),
                current_plan: state.plan(),
                history: state.history(),
                workers: &workers,
            })
            .await
            .map_err(OrchestratorError::Oracle)?;

        match decision {
            ReplanDecision::Finish => {
                tracing::info!(run_id = %state.run_id(), "replanner decided to finish");
                Ok(ReplanOutcome::Finish)
            }
            ReplanDecision::Continue(draft) => {
                if let Some(max) = self.max_replans {
                    if state.replans() >= max {
                        tracing::warn!(run_id = %state.run_id(), max, "replan budget exhausted");
                        return Ok(ReplanOutcome::BudgetExceeded);
                    }
                }
                let plan = validate_steps(draft, registry)?;
                reject_completed_steps(&plan, state)?;
                tracing::info!(run_id = %state.run_id(), steps = plan.len(), "plan replaced");
                Ok(ReplanOutcome::Continue(plan))
            }
        }
    }
}

fn reject_completed_steps(plan: &Plan, state: &ExecutionState) -> Result<(), PlanningContractError> {
    for step in plan.steps() {
        let Target::Worker(name) = &step.worker else {
            continue;
        };
        let repeated = state
            .history()
            .iter()
            .any(|past| &past.worker == name && past.task.trim() == step.task.trim());
        if repeated {
            return Err(PlanningContractError::RepeatsCompletedStep {
                worker: name.to_string(),
                task: step.task.clone(),
            });
        }
    }
    Ok(())
}
