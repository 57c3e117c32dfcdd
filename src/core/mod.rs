//! 核心编排层：错误、执行状态、Worker 注册表、路由、挂起令牌、检查点、派发闸门与主控循环

pub mod builder;
pub mod checkpoint;
pub mod error;
pub mod events;
pub mod gate;
pub mod orchestrator;
pub mod registry;
pub mod router;
pub mod state;
pub mod suspension;

pub use builder::{create_llm_from_config, create_orchestrator_builder, OrchestratorBuilder};
pub use checkpoint::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use error::{OrchestratorError, PlanningContractError, WorkerError};
pub use events::RunEvent;
pub use gate::{RunClaim, StepGate};
pub use orchestrator::{Orchestrator, OrchestratorOptions, RunHandle, RunOutcome};
pub use registry::{render_descriptors, Target, WorkerDescriptor, WorkerName, WorkerRegistry, FINISH};
pub use router::{route, RouteDecision};
pub use state::{ExecutionState, InFlightStep, PastStep, PastStepResult, Plan, Step, TerminationReason};
pub use suspension::{PendingSuspension, SuspensionToken};
