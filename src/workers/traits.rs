//! Worker 调用契约
//!
//! 两阶段协议：invoke 返回 Done（完成）或 Suspend（需要人工回答）；
//! 恢复时编排器把人工回答追加到 `WorkerRequest::answers` 后调用 resume。
//! Worker 只看得到当前步骤的 task / stopping criterion 与共享上下文，看不到完整 Plan 或其他历史。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{PastStepResult, WorkerError};
use crate::memory::Message;

/// 一次人工问答（挂起时的问题与恢复时的回答）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanExchange {
    pub question: String,
    pub answer: String,
}

/// 交给 Worker 的单步输入
#[derive(Clone, Debug)]
pub struct WorkerRequest {
    pub task: String,
    pub stopping_criterion: String,
    /// 共享上下文日志的快照
    pub context: Vec<Message>,
    /// 本步骤内已获得的人工回答，按时间顺序
    pub answers: Vec<HumanExchange>,
}

/// Worker 的单次输出
#[derive(Clone, Debug)]
pub enum WorkerOutput {
    /// 步骤完成；messages 会被追加到共享上下文
    Done {
        result: PastStepResult,
        messages: Vec<Message>,
    },
    /// 需要外部回答才能继续
    Suspend { question: String },
}

impl WorkerOutput {
    pub fn done(summary: impl Into<String>, status: bool) -> Self {
        Self::Done {
            result: PastStepResult {
                summary: summary.into(),
                status,
            },
            messages: Vec::new(),
        }
    }

    pub fn suspend(question: impl Into<String>) -> Self {
        Self::Suspend {
            question: question.into(),
        }
    }

    pub fn with_messages(self, msgs: Vec<Message>) -> Self {
        match self {
            Self::Done { result, .. } => Self::Done {
                result,
                messages: msgs,
            },
            other => other,
        }
    }
}

/// Worker trait：名称、能力描述（供 Oracle 理解）、invoke / resume
#[async_trait]
pub trait Worker: Send + Sync {
    /// 注册名（计划中 `worker` 字段的取值）
    fn name(&self) -> &str;

    /// 一行能力描述
    fn description(&self) -> &str;

    async fn invoke(&self, request: &WorkerRequest) -> Result<WorkerOutput, WorkerError>;

    /// 带着人工回答继续本步骤。`request.answers` 的最后一项即本次回答；
    /// 默认实现直接重新 invoke，由 Worker 自己根据 answers 判断进度。
    async fn resume(
        &self,
        request: &WorkerRequest,
        answer: &str,
    ) -> Result<WorkerOutput, WorkerError> {
        let _ = answer;
        self.invoke(request).await
    }
}
