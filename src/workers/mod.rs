//! Worker 层：调用契约、执行器（超时 / panic / 失败折叠）、LLM Worker 与人工介入 Worker

pub mod executor;
pub mod human;
pub mod llm_worker;
pub mod traits;

pub use executor::{StepOutcome, WorkerExecutor};
pub use human::HumanWorker;
pub use llm_worker::{parse_worker_reply, LlmWorker};
pub use traits::{HumanExchange, Worker, WorkerOutput, WorkerRequest};
