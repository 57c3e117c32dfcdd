//! Mock LLM 客户端（无需 API Key 即可跑通一次运行）
//!
//! 返回一个同时满足各解析器的 JSON：空计划、FINISH、以及回显最后一条用户消息的 summary。

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(serde_json::json!({
            "steps": [],
            "action": "FINISH",
            "summary": format!("Echo from Mock: {}", last_user),
            "status": true,
        })
        .to_string())
    }
}
