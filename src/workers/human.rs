//! 人工介入 Worker
//!
//! 把任务与停止条件转成一个问题并挂起；恢复后以人工回答作为本步骤的结果。
//! 挂了 LLM 时，先让模型结合共享上下文把问题改写成一句可直接回答的话；
//! 模型失败或输出无法解析时退回原样拼接。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::WorkerError;
use crate::llm::{extract_json, LlmClient};
use crate::memory::{render_messages, Message};
use crate::workers::{Worker, WorkerOutput, WorkerRequest};

const FRAMING_PROMPT: &str = "You phrase questions for a human operator. Given a task, its guidance \
and the conversation so far, write ONE short, self-contained question the human can answer directly. \
Respond with JSON only: {\"question\": \"<question>\"}.";

#[derive(Deserialize)]
struct FramedQuestion {
    question: String,
}

pub struct HumanWorker {
    name: String,
    description: String,
    llm: Option<Arc<dyn LlmClient>>,
}

impl HumanWorker {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            llm: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    async fn question_for(&self, request: &WorkerRequest) -> String {
        let plain = plain_question(request);
        let Some(llm) = &self.llm else {
            return plain;
        };

        let mut prompt = format!(
            "Task: {}\nGuidance: {}",
            request.task.trim(),
            request.stopping_criterion.trim()
        );
        if !request.context.is_empty() {
            prompt.push_str(&format!(
                "\n\nConversation so far:\n{}",
                render_messages(&request.context)
            ));
        }
        let messages = vec![Message::system(FRAMING_PROMPT), Message::user(prompt)];

        match llm.complete(&messages).await {
            Ok(output) => parse_framed_question(&output).unwrap_or_else(|| {
                tracing::debug!(worker = %self.name, "no framed question in LLM output, asking verbatim");
                plain
            }),
            Err(e) => {
                tracing::warn!(worker = %self.name, error = %e, "question framing failed, asking verbatim");
                plain
            }
        }
    }
}

fn plain_question(request: &WorkerRequest) -> String {
    if request.stopping_criterion.trim().is_empty() {
        request.task.trim().to_string()
    } else {
        format!(
            "{}\n(guidance: {})",
            request.task.trim(),
            request.stopping_criterion.trim()
        )
    }
}

fn parse_framed_question(output: &str) -> Option<String> {
    let json = extract_json(output)?;
    let framed: FramedQuestion = serde_json::from_str(json).ok()?;
    let question = framed.question.trim();
    (!question.is_empty()).then(|| question.to_string())
}

#[async_trait]
impl Worker for HumanWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, request: &WorkerRequest) -> Result<WorkerOutput, WorkerError> {
        match request.answers.last() {
            None => Ok(WorkerOutput::suspend(self.question_for(request).await)),
            Some(exchange) => {
                let summary = format!("Human answered: {}", exchange.answer.trim());
                let msg = Message::user(exchange.answer.clone()).with_name(self.name.clone());
                Ok(WorkerOutput::done(summary, true).with_messages(vec![msg]))
            }
        }
    }
}
