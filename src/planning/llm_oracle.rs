//! 基于 LLM 的 Oracle：规划、重规划与最终报告
//!
//! 注册表渲染为 `**name**: description` 放进 system prompt；
//! 规划输出 `{"steps": [{"worker", "task", "stopping_criterion"}]}`，
//! 重规划输出 `{"action": "FINISH"}` 或 `{"action": "REPLAN", "steps": [...]}`。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::timeout;

use crate::core::{render_descriptors, PastStep, Plan, WorkerDescriptor};
use crate::llm::{extract_json, LlmClient};
use crate::memory::Message;
use crate::planning::{
    PlanRequest, PlanningOracle, ProposedStep, ReplanDecision, ReplanRequest, ReplanningOracle,
    SummaryGenerator,
};

pub const DEFAULT_SUPERVISOR_PROMPT: &str = "You are the supervisor coordinating a team of specialized workers. \
Each worker owns one narrow capability. Break the user's request into an ordered plan where every step is \
handled by exactly one worker, give each step a concrete task and a stopping criterion that tells the worker \
when it is done, and sequence steps so that a step only runs after the steps it depends on.";

#[derive(Deserialize)]
struct PlanReply {
    #[serde(default, alias = "plan_steps")]
    steps: Vec<ProposedStep>,
}

#[derive(Deserialize)]
struct ReplanReply {
    action: String,
    #[serde(default, alias = "plan_steps")]
    steps: Vec<ProposedStep>,
}

pub struct LlmOracle {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    timeout: Duration,
}

impl LlmOracle {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    fn system(&self, workers: &[WorkerDescriptor]) -> String {
        format!(
            "{}\n\nThe available workers are:\n{}",
            self.system_prompt,
            render_descriptors(workers)
        )
    }

    async fn ask(&self, system: String, prompt: String) -> Result<String, String> {
        let messages = vec![Message::system(system), Message::user(prompt)];
        match timeout(self.timeout, self.llm.complete(&messages)).await {
            Ok(res) => res,
            Err(_) => Err(format!("oracle call timed out after {}s", self.timeout.as_secs())),
        }
    }
}

fn render_plan(plan: &Plan) -> String {
    if plan.is_empty() {
        return "(empty)".to_string();
    }
    plan.steps()
        .enumerate()
        .map(|(n, s)| {
            format!(
                "{}. Agent: {} || Task: {} || Stopping criteria: {}",
                n + 1,
                s.worker,
                s.task,
                s.stopping_criterion
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_history(history: &[PastStep]) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(n, p)| {
            format!(
                "{}. Agent: {} || Task: {} || Task summary: {} || Task completion status: {}",
                n + 1,
                p.worker,
                p.task,
                p.summary,
                if p.status { "True" } else { "False" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const STEP_FORMAT: &str = r#"{"worker": "<worker name>", "task": "<what to do>", "stopping_criterion": "<when the step is done>"}"#;

pub fn parse_plan(output: &str) -> Result<Vec<ProposedStep>, String> {
    let trimmed = output.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| format!("{}: {}", e, trimmed));
    }
    let json = extract_json(trimmed).ok_or_else(|| format!("no JSON plan in output: {trimmed}"))?;
    let reply: PlanReply = serde_json::from_str(json).map_err(|e| format!("{}: {}", e, json))?;
    Ok(reply.steps)
}

pub fn parse_replan(output: &str) -> Result<ReplanDecision, String> {
    let trimmed = output.trim();
    let json = extract_json(trimmed).ok_or_else(|| format!("no JSON decision in output: {trimmed}"))?;
    let reply: ReplanReply = serde_json::from_str(json).map_err(|e| format!("{}: {}", e, json))?;
    match reply.action.trim().to_uppercase().as_str() {
        "FINISH" => Ok(ReplanDecision::Finish),
        "REPLAN" | "CONTINUE" => Ok(ReplanDecision::Continue(reply.steps)),
        other => Err(format!("unknown replan action: {other}")),
    }
}

#[async_trait]
impl PlanningOracle for LlmOracle {
    async fn plan(&self, request: PlanRequest<'_>) -> Result<Vec<ProposedStep>, String> {
        let prompt = format!(
            "Create a step by step plan for the following user query:\n{}\n\n\
             Respond with JSON only: {{\"steps\": [{}]}}\n\
             Return an empty list of steps if the request is already accomplished.",
            request.goal, STEP_FORMAT
        );
        let output = self.ask(self.system(request.workers), prompt).await?;
        parse_plan(&output)
    }
}

#[async_trait]
impl ReplanningOracle for LlmOracle {
    async fn replan(&self, request: ReplanRequest<'_>) -> Result<ReplanDecision, String> {
        let prompt = format!(
            "You are given a user query, the plan that is still pending and the steps executed so far.\n\n\
             The user query is:\n{}\n\n\
             The existing plan is:\n{}\n\n\
             The past steps executed so far are:\n{}\n\n\
             If everything the user asked for is accomplished, respond with {{\"action\": \"FINISH\"}}.\n\
             Otherwise respond with {{\"action\": \"REPLAN\", \"steps\": [{}]}} containing only the steps \
             that still need to run. Never repeat a step that already appears in the past steps.\n\
             Respond with JSON only.",
            request.goal,
            render_plan(request.current_plan),
            render_history(request.history),
            STEP_FORMAT
        );
        let output = self.ask(self.system(request.workers), prompt).await?;
        parse_replan(&output)
    }
}

#[async_trait]
impl SummaryGenerator for LlmOracle {
    async fn summarize(&self, goal: &str, history: &[PastStep]) -> Result<String, String> {
        let prompt = format!(
            "Write a concise markdown report for the user.\n\n\
             The user query was:\n{}\n\n\
             The steps executed were:\n{}\n\n\
             Describe what was done, what failed, and whether the request was fulfilled.",
            goal,
            render_history(history)
        );
        let output = self.ask(self.system_prompt.clone(), prompt).await?;
        let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
        tracing::info!(prompt_tokens, completion_tokens, total_tokens, "oracle token usage");
        Ok(output.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_parse_plan_variants() {
        let steps = parse_plan(
            "```json\n{\"steps\": [{\"worker\": \"editor\", \"task\": \"set date\", \"stopping_criteria\": \"saved\"}]}\n```",
        )
        .unwrap();
        assert_eq!(steps, vec![ProposedStep::new("editor", "set date", "saved")]);

        let steps = parse_plan(r#"[{"agent": "runner", "task": "run"}]"#).unwrap();
        assert_eq!(steps[0].worker, "runner");
        assert_eq!(steps[0].stopping_criterion, "");

        assert!(parse_plan("I cannot help").is_err());
    }

    #[test]
    fn test_parse_replan_actions() {
        assert_eq!(parse_replan(r#"{"action": "finish"}"#).unwrap(), ReplanDecision::Finish);
        assert_eq!(
            parse_replan(r#"{"action": "REPLAN", "steps": [{"worker": "a", "task": "t", "stopping_criterion": "c"}]}"#)
                .unwrap(),
            ReplanDecision::Continue(vec![ProposedStep::new("a", "t", "c")])
        );
        assert!(parse_replan(r#"{"action": "PAUSE"}"#).is_err());
    }

    #[tokio::test]
    async fn test_mock_llm_drives_empty_plan() {
        let oracle = LlmOracle::new(Arc::new(MockLlmClient), DEFAULT_SUPERVISOR_PROMPT, 5);
        let steps = oracle
            .plan(PlanRequest {
                goal: "no-op",
                workers: &[],
            })
            .await
            .unwrap();
        assert!(steps.is_empty());
    }
}
