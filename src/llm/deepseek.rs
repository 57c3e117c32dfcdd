//! DeepSeek 后端：按 `[llm]` / `[llm.deepseek]` 配置解析端点与模型，复用 OpenAI 兼容客户端

use crate::config::LlmSection;
use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 模型优先级：`[llm.deepseek].model` > `[llm].model`（非空时）> deepseek-chat
pub fn deepseek_model(llm: &LlmSection) -> String {
    llm.deepseek
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| Some(llm.model.clone()).filter(|m| !m.trim().is_empty()))
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string())
}

/// `[llm].base_url` 可指向自建的兼容网关；未设置时用官方端点
pub fn deepseek_base_url(llm: &LlmSection) -> &str {
    llm.base_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(DEEPSEEK_BASE_URL)
}

/// 创建 DeepSeek 客户端；Key 取 `DEEPSEEK_API_KEY`，其次 `OPENAI_API_KEY`
pub fn create_deepseek_client(llm: &LlmSection) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let model = deepseek_model(llm);
    tracing::debug!(model = %model, base_url = deepseek_base_url(llm), "deepseek client");
    OpenAiClient::new(Some(deepseek_base_url(llm)), &model, api_key.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_prefers_deepseek_section() {
        let mut llm = LlmSection::default();
        llm.model = "generic-model".into();
        assert_eq!(deepseek_model(&llm), "generic-model");

        llm.deepseek.model = Some("deepseek-reasoner".into());
        assert_eq!(deepseek_model(&llm), "deepseek-reasoner");

        llm.deepseek.model = Some("  ".into());
        llm.model = String::new();
        assert_eq!(deepseek_model(&llm), DEEPSEEK_CHAT);
    }

    #[test]
    fn test_base_url_override() {
        let mut llm = LlmSection::default();
        assert_eq!(deepseek_base_url(&llm), DEEPSEEK_BASE_URL);
        llm.base_url = Some("http://localhost:8080/v1".into());
        assert_eq!(deepseek_base_url(&llm), "http://localhost:8080/v1");
    }
}
