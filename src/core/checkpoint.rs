//! 检查点持久化
//!
//! 每次状态变化后整体写入 ExecutionState，使派发中的在途指针与挂起状态能跨进程重启。
//! 文件实现：每个运行一个 JSON 文件，先写临时文件再 rename。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{ExecutionState, OrchestratorError};

/// 检查点存储 trait
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, state: &ExecutionState) -> Result<(), OrchestratorError>;

    async fn load(&self, run_id: &str) -> Result<Option<ExecutionState>, OrchestratorError>;

    async fn list(&self) -> Result<Vec<String>, OrchestratorError>;
}

/// 内存实现（测试与 `checkpoint = "memory"`）
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    states: RwLock<HashMap<String, ExecutionState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, state: &ExecutionState) -> Result<(), OrchestratorError> {
        self.states
            .write()
            .await
            .insert(state.run_id().to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<ExecutionState>, OrchestratorError> {
        Ok(self.states.read().await.get(run_id).cloned())
    }

    async fn list(&self) -> Result<Vec<String>, OrchestratorError> {
        let mut ids: Vec<String> = self.states.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// 文件实现：`<dir>/<run_id>.json`
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, run_id: &str) -> Result<PathBuf, OrchestratorError> {
        // run_id 来自令牌文本，可能被外部篡改
        if run_id.is_empty()
            || !run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(OrchestratorError::Checkpoint(format!(
                "invalid run id: {run_id}"
            )));
        }
        Ok(self.dir.join(format!("{run_id}.json")))
    }
}

fn io_err(e: std::io::Error) -> OrchestratorError {
    OrchestratorError::Checkpoint(e.to_string())
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, state: &ExecutionState) -> Result<(), OrchestratorError> {
        let path = self.path_for(state.run_id())?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        let data = serde_json::to_string_pretty(state)
            .map_err(|e| OrchestratorError::Checkpoint(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<ExecutionState>, OrchestratorError> {
        let path = self.path_for(run_id)?;
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        let state = serde_json::from_str(&data)
            .map_err(|e| OrchestratorError::Checkpoint(format!("{}: {}", path.display(), e)))?;
        Ok(Some(state))
    }

    async fn list(&self) -> Result<Vec<String>, OrchestratorError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(io_err(e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Plan, TerminationReason};

    #[tokio::test]
    async fn test_file_store_roundtrip_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("state"));

        let mut state = ExecutionState::new("goal");
        state.install_plan(Plan::empty());
        state.terminate(TerminationReason::PlanExhausted);
        store.save(&state).await.unwrap();

        let loaded = store.load(state.run_id()).await.unwrap().unwrap();
        assert_eq!(loaded.goal(), "goal");
        assert!(loaded.is_planned());
        assert_eq!(loaded.termination(), Some(TerminationReason::PlanExhausted));
        assert_eq!(store.list().await.unwrap(), vec![state.run_id().to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_run_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert!(store.load("../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_missing_run() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("run_x").await.unwrap().is_none());
    }
}
