//! Router：每次弹出计划头部的一个步骤并派发
//!
//! 终止标志已设置或计划为空时返回 Terminate；弹出 FINISH 步骤同样终止。
//! 派发时设置在途指针，由编排器随后写入检查点。

use crate::core::registry::Target;
use crate::core::state::{ExecutionState, Step, TerminationReason};

/// 路由决策
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Dispatch(Step),
    Terminate(TerminationReason),
}

pub fn route(state: &mut ExecutionState) -> RouteDecision {
    if let Some(reason) = state.termination() {
        return RouteDecision::Terminate(reason);
    }
    let Some(step) = state.pop_step() else {
        state.terminate(TerminationReason::PlanExhausted);
        return RouteDecision::Terminate(TerminationReason::PlanExhausted);
    };
    match &step.worker {
        Target::Finish => {
            state.terminate(TerminationReason::FinishStep);
            RouteDecision::Terminate(TerminationReason::FinishStep)
        }
        Target::Worker(name) => {
            state.begin_step(name.clone(), &step);
            RouteDecision::Dispatch(step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::WorkerName;
    use crate::core::state::Plan;

    fn step(worker: Target, task: &str) -> Step {
        Step {
            worker,
            task: task.into(),
            stopping_criterion: "c".into(),
        }
    }

    #[test]
    fn test_empty_plan_terminates() {
        let mut state = ExecutionState::new("no-op");
        state.install_plan(Plan::empty());
        assert_eq!(
            route(&mut state),
            RouteDecision::Terminate(TerminationReason::PlanExhausted)
        );
        assert!(state.is_terminated());
    }

    #[test]
    fn test_dispatch_pops_head_in_order() {
        let mut state = ExecutionState::new("g");
        let a = Target::Worker(WorkerName::new("a"));
        let b = Target::Worker(WorkerName::new("b"));
        state.install_plan(Plan::new(vec![step(a.clone(), "1"), step(b.clone(), "2")]));

        assert_eq!(route(&mut state), RouteDecision::Dispatch(step(a, "1")));
        assert_eq!(state.in_flight().unwrap().task, "1");
        assert_eq!(state.plan().len(), 1);
    }

    #[test]
    fn test_termination_flag_wins_over_remaining_plan() {
        let mut state = ExecutionState::new("g");
        state.install_plan(Plan::new(vec![step(Target::Worker(WorkerName::new("a")), "1")]));
        state.terminate(TerminationReason::Finished);
        assert_eq!(
            route(&mut state),
            RouteDecision::Terminate(TerminationReason::Finished)
        );
        assert_eq!(state.plan().len(), 1);
    }

    #[test]
    fn test_finish_step_terminates() {
        let mut state = ExecutionState::new("g");
        state.install_plan(Plan::new(vec![step(Target::Finish, "")]));
        assert_eq!(
            route(&mut state),
            RouteDecision::Terminate(TerminationReason::FinishStep)
        );
        assert_eq!(state.dispatches(), 0);
    }
}
