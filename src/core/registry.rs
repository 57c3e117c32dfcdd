//! Worker 注册表
//!
//! 名称 -> Worker 实现 + 能力描述。合法的 Worker 名只有注册表中的键与哨兵 `FINISH`；
//! `WorkerName` 只能经由注册表解析得到，未知名称在计划校验阶段就被拒绝，而不是等到派发时。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{OrchestratorError, PlanningContractError};
use crate::workers::Worker;

/// 结束哨兵
pub const FINISH: &str = "FINISH";

/// 已注册的 Worker 名
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerName(String);

impl WorkerName {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 步骤目标：某个已注册 Worker，或结束哨兵
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Worker(WorkerName),
    Finish,
}

impl Target {
    pub fn as_str(&self) -> &str {
        match self {
            Target::Worker(name) => name.as_str(),
            Target::Finish => FINISH,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 名称 + 一行描述，用于拼 Oracle 上下文
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub name: String,
    pub description: String,
}

/// 注册表：BTreeMap 保证渲染顺序稳定
#[derive(Default, Clone)]
pub struct WorkerRegistry {
    workers: BTreeMap<String, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, worker: impl Worker + 'static) -> Result<(), OrchestratorError> {
        self.register_arc(Arc::new(worker))
    }

    /// 注册；名称为空、与 `FINISH` 冲突或重复时报错
    pub fn register_arc(&mut self, worker: Arc<dyn Worker>) -> Result<(), OrchestratorError> {
        let name = worker.name().trim().to_string();
        if name.is_empty() {
            return Err(OrchestratorError::Config("worker name is empty".into()));
        }
        if name.eq_ignore_ascii_case(FINISH) {
            return Err(OrchestratorError::Config(format!(
                "worker name '{name}' is reserved"
            )));
        }
        if self.workers.contains_key(&name) {
            return Err(OrchestratorError::Config(format!(
                "worker '{name}' registered twice"
            )));
        }
        self.workers.insert(name, worker);
        Ok(())
    }

    /// 将 Oracle 给出的名称解析为合法目标
    pub fn resolve(&self, name: &str) -> Result<Target, PlanningContractError> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(FINISH) {
            return Ok(Target::Finish);
        }
        if self.workers.contains_key(name) {
            Ok(Target::Worker(WorkerName::new(name)))
        } else {
            Err(PlanningContractError::UnknownWorker(name.to_string()))
        }
    }

    pub fn get(&self, name: &WorkerName) -> Option<Arc<dyn Worker>> {
        self.workers.get(name.as_str()).cloned()
    }

    pub fn descriptors(&self) -> Vec<WorkerDescriptor> {
        self.workers
            .iter()
            .map(|(name, w)| WorkerDescriptor {
                name: name.clone(),
                description: w.description().to_string(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// 渲染为 `**name**: description` 列表，供 prompt 使用
pub fn render_descriptors(descriptors: &[WorkerDescriptor]) -> String {
    descriptors
        .iter()
        .map(|d| format!("**{}**: {}", d.name, d.description))
        .collect::<Vec<_>>()
        .join("\n")
}
