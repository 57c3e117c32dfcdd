//! 基于 LLM 的 Worker
//!
//! 常量（system prompt、名称、描述）全部来自构造时传入的配置段，不写死在代码里。
//! 期望模型输出 `{"summary": "...", "status": true}`；需要人工确认时输出 `{"ask_human": "..."}`。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::WorkerSection;
use crate::core::{PastStepResult, WorkerError};
use crate::llm::{extract_json, LlmClient};
use crate::memory::{render_messages, Message};
use crate::workers::{Worker, WorkerOutput, WorkerRequest};

const REPLY_FORMAT: &str = "When the stopping criterion is met (or cannot be met), respond with JSON only: \
{\"summary\": \"<what you did and the outcome>\", \"status\": true|false}. \
If you need a decision from the human before you can continue, respond with JSON only: \
{\"ask_human\": \"<question>\"}.";

pub struct LlmWorker {
    name: String,
    description: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
}

impl LlmWorker {
    pub fn new(section: &WorkerSection, llm: Arc<dyn LlmClient>) -> Self {
        let system_prompt = section.system_prompt.clone().unwrap_or_else(|| {
            format!(
                "You are the '{}' worker. Your capability: {}",
                section.name, section.description
            )
        });
        Self {
            name: section.name.clone(),
            description: section.description.clone(),
            system_prompt,
            llm,
        }
    }

    fn build_messages(&self, request: &WorkerRequest) -> Vec<Message> {
        let mut prompt = format!(
            "Task: {}\nStopping criteria: {}",
            request.task, request.stopping_criterion
        );
        if !request.context.is_empty() {
            prompt.push_str(&format!(
                "\n\nContext so far:\n{}",
                render_messages(&request.context)
            ));
        }
        if !request.answers.is_empty() {
            prompt.push_str("\n\nAnswers from the human:");
            for a in &request.answers {
                prompt.push_str(&format!("\nQ: {}\nA: {}", a.question, a.answer));
            }
        }
        vec![
            Message::system(format!("{}\n\n{}", self.system_prompt, REPLY_FORMAT)),
            Message::user(prompt),
        ]
    }
}

/// 解析 Worker 回复；status 兼容布尔值与 "True"/"False" 字符串
pub fn parse_worker_reply(output: &str) -> Result<WorkerOutput, WorkerError> {
    let json = extract_json(output)
        .ok_or_else(|| WorkerError::InvalidResponse(format!("no JSON in output: {}", output.trim())))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| WorkerError::InvalidResponse(format!("{}: {}", e, json)))?;

    if let Some(q) = value.get("ask_human").and_then(Value::as_str) {
        if !q.trim().is_empty() {
            return Ok(WorkerOutput::suspend(q.trim()));
        }
    }

    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .ok_or_else(|| WorkerError::InvalidResponse("missing summary".to_string()))?;
    let status = match value.get("status") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => return Err(WorkerError::InvalidResponse("missing status".to_string())),
    };
    Ok(WorkerOutput::Done {
        result: PastStepResult {
            summary: summary.trim().to_string(),
            status,
        },
        messages: Vec::new(),
    })
}

#[async_trait]
impl Worker for LlmWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, request: &WorkerRequest) -> Result<WorkerOutput, WorkerError> {
        let output = self
            .llm
            .complete(&self.build_messages(request))
            .await
            .map_err(WorkerError::Llm)?;
        let reply = parse_worker_reply(&output)?;
        if let WorkerOutput::Done { result, .. } = &reply {
            let msg = Message::assistant(result.summary.clone()).with_name(self.name.clone());
            return Ok(reply.with_messages(vec![msg]));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_status_forms() {
        match parse_worker_reply(r#"{"summary": "set asof date", "status": "True"}"#).unwrap() {
            WorkerOutput::Done { result, .. } => {
                assert!(result.status);
                assert_eq!(result.summary, "set asof date");
            }
            _ => panic!("expected Done"),
        }
        match parse_worker_reply(r#"{"summary": "x", "status": false}"#).unwrap() {
            WorkerOutput::Done { result, .. } => assert!(!result.status),
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn test_parse_reply_ask_human() {
        assert!(matches!(
            parse_worker_reply(r#"{"ask_human": "overwrite portfolio.xml?"}"#).unwrap(),
            WorkerOutput::Suspend { ref question } if question == "overwrite portfolio.xml?"
        ));
    }

    #[test]
    fn test_parse_reply_rejects_garbage() {
        assert!(parse_worker_reply("sure, done!").is_err());
        assert!(parse_worker_reply(r#"{"summary": "x"}"#).is_err());
    }
}
