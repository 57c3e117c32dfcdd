//! Planner：运行开始时调用一次规划 Oracle，并把草稿计划校验为 Plan
//!
//! 引用未注册 Worker 的步骤视为契约违规，整份计划被拒绝，而不是静默丢弃该步骤。

use std::sync::Arc;

use crate::core::{OrchestratorError, Plan, PlanningContractError, Step, WorkerRegistry};
use crate::planning::{PlanRequest, PlanningOracle, ProposedStep};

pub struct Planner {
    oracle: Arc<dyn PlanningOracle>,
}

impl Planner {
    pub fn new(oracle: Arc<dyn PlanningOracle>) -> Self {
        Self { oracle }
    }

    pub async fn plan(&self, goal: &str, registry: &WorkerRegistry) -> Result<Plan, OrchestratorError> {
        let workers = registry.descriptors();
        let draft = self
            .oracle
            .plan(PlanRequest {
                goal,
                workers: &workers,
            })
            .await
            .map_err(OrchestratorError::Oracle)?;
        let plan = validate_steps(draft, registry)?;
        tracing::info!(steps = plan.len(), "initial plan created");
        Ok(plan)
    }
}

/// 逐个解析 Worker 名；任一失败则整份计划无效
pub fn validate_steps(
    draft: Vec<ProposedStep>,
    registry: &WorkerRegistry,
) -> Result<Plan, PlanningContractError> {
    let steps = draft
        .into_iter()
        .map(|p| {
            Ok(Step {
                worker: registry.resolve(&p.worker)?,
                task: p.task.trim().to_string(),
                stopping_criterion: p.stopping_criterion.trim().to_string(),
            })
        })
        .collect::<Result<Vec<_>, PlanningContractError>>()?;
    Ok(Plan::new(steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Target;
    use crate::planning::ScriptedOracle;
    use crate::workers::HumanWorker;

    fn registry() -> WorkerRegistry {
        let mut reg = WorkerRegistry::new();
        reg.register(HumanWorker::new("human", "asks the user")).unwrap();
        reg
    }

    #[tokio::test]
    async fn test_plan_rejects_unknown_worker() {
        let oracle = ScriptedOracle::new(vec![
            ProposedStep::new("human", "ask", "answered"),
            ProposedStep::new("ghost", "haunt", "done"),
        ]);
        let planner = Planner::new(Arc::new(oracle));
        let err = planner.plan("goal", &registry()).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::PlanningContract(PlanningContractError::UnknownWorker(ref n)) if n == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_plan_accepts_empty_and_finish() {
        let planner = Planner::new(Arc::new(ScriptedOracle::new(vec![])));
        assert!(planner.plan("no-op", &registry()).await.unwrap().is_empty());

        let plan = validate_steps(vec![ProposedStep::new("FINISH", "", "")], &registry()).unwrap();
        assert_eq!(plan.to_vec()[0].worker, Target::Finish);
    }
}
