//! 终止与总结：运行结束时调用一次 SummaryGenerator，输出即最终产物
//!
//! 生成器返回空白时，用目标与历史渲染一份 Markdown 报告，保证最终产物非空。

use std::sync::Arc;

use crate::core::{OrchestratorError, PastStep, TerminationReason};
use crate::planning::SummaryGenerator;

pub struct Summarizer {
    generator: Arc<dyn SummaryGenerator>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn SummaryGenerator>) -> Self {
        Self { generator }
    }

    pub async fn report(
        &self,
        goal: &str,
        history: &[PastStep],
        reason: TerminationReason,
    ) -> Result<String, OrchestratorError> {
        let report = self
            .generator
            .summarize(goal, history)
            .await
            .map_err(OrchestratorError::Oracle)?;
        if report.trim().is_empty() {
            tracing::warn!("summary generator returned an empty report, rendering history");
            return Ok(render_report(goal, history, reason));
        }
        Ok(report)
    }
}

/// 按执行顺序渲染历史
pub fn render_report(goal: &str, history: &[PastStep], reason: TerminationReason) -> String {
    let mut out = format!("# Report\n\n**Goal:** {}\n\n", goal);
    if history.is_empty() {
        out.push_str("No steps were executed.\n");
    } else {
        out.push_str("## Steps\n\n");
        for (i, step) in history.iter().enumerate() {
            out.push_str(&format!(
                "{}. **{}**: {} ({})\n",
                i + 1,
                step.worker,
                step.summary,
                if step.status { "done" } else { "failed" }
            ));
        }
    }
    out.push_str(&format!("\nTermination: {:?}\n", reason));
    out
}
