//! 编排器构建器：从 AppConfig 组装 LLM、Worker 注册表、Oracle 与检查点存储
//!
//! CLI 与测试共用同一套初始化逻辑。

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AppConfig, CheckpointKind, WorkerKind};
use crate::core::{
    CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, Orchestrator,
    OrchestratorError, OrchestratorOptions, WorkerRegistry,
};
use crate::llm::{create_deepseek_client, deepseek_model, LlmClient, MockLlmClient, OpenAiClient};
use crate::planning::{LlmOracle, DEFAULT_SUPERVISOR_PROMPT};
use crate::workers::{HumanWorker, LlmWorker};

/// 按 provider 与可用的 API Key 选择 LLM 后端；都没有时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient);
    }
    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        tracing::info!("Using DeepSeek LLM ({})", deepseek_model(&cfg.llm));
        Arc::new(create_deepseek_client(&cfg.llm))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base = cfg.llm.base_url.as_deref();
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            base,
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}

/// 编排器构建器
pub struct OrchestratorBuilder {
    config: AppConfig,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.config.app.state_dir.clone()
    }

    /// 按 `[[workers]]` 注册 Worker；未配置任何 Worker 时注册一个人工 Worker
    pub fn build_registry(&self, llm: Arc<dyn LlmClient>) -> Result<WorkerRegistry, OrchestratorError> {
        let mut registry = WorkerRegistry::new();
        for section in &self.config.workers {
            match section.kind {
                WorkerKind::Llm => registry.register(LlmWorker::new(section, llm.clone()))?,
                WorkerKind::Human => registry.register(
                    HumanWorker::new(section.name.clone(), section.description.clone())
                        .with_llm(llm.clone()),
                )?,
            }
        }
        if registry.is_empty() {
            tracing::warn!("No workers configured, registering the default human worker");
            registry.register(
                HumanWorker::new("human", "Asks the user a question and reports the answer")
                    .with_llm(llm),
            )?;
        }
        tracing::info!(workers = ?registry.names(), "worker registry built");
        Ok(registry)
    }

    pub fn build_store(&self) -> Arc<dyn CheckpointStore> {
        match self.config.orchestrator.checkpoint {
            CheckpointKind::File => Arc::new(FileCheckpointStore::new(self.state_dir())),
            CheckpointKind::Memory => Arc::new(InMemoryCheckpointStore::new()),
        }
    }

    pub fn options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            max_replans: self.config.orchestrator.max_replans,
            worker_timeout_secs: self.config.orchestrator.worker_timeout_secs,
        }
    }

    pub fn build(self) -> Result<Arc<Orchestrator>, OrchestratorError> {
        let llm = create_llm_from_config(&self.config);
        let registry = self.build_registry(llm.clone())?;
        let prompt = self
            .config
            .orchestrator
            .supervisor_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SUPERVISOR_PROMPT.to_string());
        let oracle = Arc::new(LlmOracle::new(llm, prompt, self.config.llm.timeouts.request));

        Ok(Arc::new(Orchestrator::with_oracle(
            registry,
            oracle,
            self.build_store(),
            self.options(),
        )))
    }
}

/// 便捷函数：加载配置（失败时用默认值）并创建构建器
pub fn create_orchestrator_builder(config_path: Option<PathBuf>) -> OrchestratorBuilder {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    OrchestratorBuilder::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerSection;
    use crate::core::{RunOutcome, TerminationReason};

    fn config_with_workers() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        cfg.orchestrator.checkpoint = CheckpointKind::Memory;
        cfg.workers = vec![
            WorkerSection {
                name: "editor".into(),
                description: "edits portfolio files".into(),
                kind: WorkerKind::Llm,
                system_prompt: None,
            },
            WorkerSection {
                name: "human".into(),
                description: "asks the user".into(),
                kind: WorkerKind::Human,
                system_prompt: None,
            },
        ];
        cfg
    }

    #[test]
    fn test_registry_from_config() {
        let builder = OrchestratorBuilder::new(config_with_workers());
        let registry = builder.build_registry(Arc::new(MockLlmClient)).unwrap();
        assert_eq!(registry.names(), vec!["editor".to_string(), "human".to_string()]);
    }

    #[test]
    fn test_duplicate_worker_names_rejected() {
        let mut cfg = config_with_workers();
        cfg.workers[1].name = "editor".into();
        let builder = OrchestratorBuilder::new(cfg);
        assert!(builder.build_registry(Arc::new(MockLlmClient)).is_err());
    }

    #[tokio::test]
    async fn test_mock_llm_run_completes_with_empty_plan() {
        let orch = OrchestratorBuilder::new(config_with_workers()).build().unwrap();
        let outcome = orch.start_run("no-op").wait().await.unwrap();
        match outcome {
            RunOutcome::Completed { report, reason } => {
                assert_eq!(reason, TerminationReason::PlanExhausted);
                assert!(!report.trim().is_empty());
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }
}
