//! Worker 执行器
//!
//! 对每次 invoke / resume 施加超时并捕获 panic；Worker 的任何失败都折叠为
//! `status = false` 且 summary 为错误描述的结果，运行不会因此中断，交给 Replanner 处理。
//! 每次调用输出一条结构化审计日志（JSON）。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::time::timeout;

use crate::core::{PastStepResult, WorkerError};
use crate::memory::Message;
use crate::workers::{Worker, WorkerOutput, WorkerRequest};

/// 单次调用的结果（错误已折叠）
#[derive(Clone, Debug)]
pub enum StepOutcome {
    Completed {
        result: PastStepResult,
        messages: Vec<Message>,
    },
    Suspended {
        question: String,
    },
}

pub struct WorkerExecutor {
    timeout: Duration,
}

impl WorkerExecutor {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    /// answer 为 Some 时调用 resume，否则 invoke
    pub async fn run(
        &self,
        worker: &dyn Worker,
        request: &WorkerRequest,
        answer: Option<&str>,
    ) -> StepOutcome {
        let start = Instant::now();
        let call = async {
            match answer {
                Some(a) => worker.resume(request, a).await,
                None => worker.invoke(request).await,
            }
        };
        let result = match timeout(self.timeout, AssertUnwindSafe(call).catch_unwind()).await {
            Ok(Ok(Ok(WorkerOutput::Suspend { question }))) if question.trim().is_empty() => Err(
                WorkerError::InvalidResponse("suspended without a question".to_string()),
            ),
            Ok(Ok(res)) => res,
            Ok(Err(panic)) => Err(WorkerError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(WorkerError::Timeout(self.timeout.as_secs())),
        };

        let outcome = match &result {
            Ok(WorkerOutput::Done { result, .. }) if result.status => "ok",
            Ok(WorkerOutput::Done { .. }) => "not_completed",
            Ok(WorkerOutput::Suspend { .. }) => "suspended",
            Err(WorkerError::Timeout(_)) => "timeout",
            Err(WorkerError::Panicked(_)) => "panic",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "worker_audit",
            "worker": worker.name(),
            "resumed": answer.is_some(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "task_preview": preview(&request.task),
        });
        tracing::info!(audit = %audit, "worker");

        match result {
            Ok(WorkerOutput::Done { result, messages }) => StepOutcome::Completed { result, messages },
            Ok(WorkerOutput::Suspend { question }) => StepOutcome::Suspended { question },
            Err(e) => {
                tracing::warn!(worker = worker.name(), error = %e, "worker failed, recording failed step");
                StepOutcome::Completed {
                    result: PastStepResult {
                        summary: format!("Error: {}", e),
                        status: false,
                    },
                    messages: Vec::new(),
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 200 {
        format!("{}...", text.chars().take(200).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    enum Behaviour {
        Fail,
        Panic,
        Hang,
        EmptyQuestion,
    }

    struct Flaky(Behaviour);

    #[async_trait]
    impl Worker for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "misbehaves"
        }

        async fn invoke(&self, _request: &WorkerRequest) -> Result<WorkerOutput, WorkerError> {
            match self.0 {
                Behaviour::Fail => Err(WorkerError::Failed("disk full".into())),
                Behaviour::Panic => panic!("boom"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(WorkerOutput::done("late", true))
                }
                Behaviour::EmptyQuestion => Ok(WorkerOutput::suspend(" ")),
            }
        }
    }

    fn request() -> WorkerRequest {
        WorkerRequest {
            task: "t".into(),
            stopping_criterion: "c".into(),
            context: vec![],
            answers: vec![],
        }
    }

    fn failed_summary(outcome: StepOutcome) -> String {
        match outcome {
            StepOutcome::Completed { result, .. } => {
                assert!(!result.status);
                result.summary
            }
            other => panic!("expected failed completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_becomes_failed_step() {
        let exec = WorkerExecutor::new(5);
        let summary = failed_summary(exec.run(&Flaky(Behaviour::Fail), &request(), None).await);
        assert!(summary.contains("disk full"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_step() {
        let exec = WorkerExecutor::new(5);
        let summary = failed_summary(exec.run(&Flaky(Behaviour::Panic), &request(), None).await);
        assert!(summary.contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_step() {
        let exec = WorkerExecutor::new(1);
        let summary = failed_summary(exec.run(&Flaky(Behaviour::Hang), &request(), None).await);
        assert!(summary.contains("timed out"));
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let exec = WorkerExecutor::new(5);
        let summary =
            failed_summary(exec.run(&Flaky(Behaviour::EmptyQuestion), &request(), None).await);
        assert!(summary.contains("without a question"));
    }
}
