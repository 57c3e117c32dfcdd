//! 规划层：Oracle 契约、Planner / Replanner 适配器、终止总结、LLM 与脚本化 Oracle

pub mod llm_oracle;
pub mod oracle;
pub mod planner;
pub mod replanner;
pub mod scripted;
pub mod summary;

pub use llm_oracle::{LlmOracle, DEFAULT_SUPERVISOR_PROMPT};
pub use oracle::{
    PlanRequest, PlanningOracle, ProposedStep, ReplanDecision, ReplanRequest, ReplanningOracle,
    SummaryGenerator,
};
pub use planner::{validate_steps, Planner};
pub use replanner::{ReplanOutcome, Replanner};
pub use scripted::ScriptedOracle;
pub use summary::{render_report, Summarizer};
