//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub orchestrator: OrchestratorSection,
    /// `[[workers]]`：注册到编排器的 Worker
    pub workers: Vec<WorkerSection>,
}

/// [app] 段：应用名、检查点目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；没有 API Key 时总是退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次 Oracle 调用超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// 检查点存储方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    #[default]
    File,
    Memory,
}

/// [orchestrator] 段：重规划上限、Worker 超时、检查点
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// 不设置表示不限制重规划次数
    pub max_replans: Option<usize>,
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,
    #[serde(default)]
    pub checkpoint: CheckpointKind,
    /// Supervisor system prompt；不设置时用内置提示词
    pub supervisor_prompt: Option<String>,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_replans: None,
            worker_timeout_secs: default_worker_timeout_secs(),
            checkpoint: CheckpointKind::default(),
            supervisor_prompt: None,
        }
    }
}

fn default_worker_timeout_secs() -> u64 {
    300
}

/// Worker 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    #[default]
    Llm,
    Human,
}

/// [[workers]] 条目：名称、能力描述与 Worker 自己的 system prompt
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSection {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub kind: WorkerKind,
    pub system_prompt: Option<String>,
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers_and_orchestrator_sections() {
        let toml = r#"
            [orchestrator]
            max_replans = 5
            checkpoint = "memory"

            [[workers]]
            name = "editor"
            description = "edits portfolio XML files"

            [[workers]]
            name = "human"
            description = "asks the user"
            kind = "human"
        "#;
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.orchestrator.max_replans, Some(5));
        assert_eq!(cfg.orchestrator.worker_timeout_secs, 300);
        assert_eq!(cfg.orchestrator.checkpoint, CheckpointKind::Memory);
        assert_eq!(cfg.workers.len(), 2);
        assert_eq!(cfg.workers[0].kind, WorkerKind::Llm);
        assert_eq!(cfg.workers[1].kind, WorkerKind::Human);
        assert_eq!(cfg.app.state_dir, PathBuf::from("state"));
    }

    #[test]
    fn test_defaults_without_sources() {
        let cfg = AppConfig::default();
        assert!(cfg.orchestrator.max_replans.is_none());
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert!(cfg.workers.is_empty());
    }
}
