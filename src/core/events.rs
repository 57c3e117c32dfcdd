//! 运行事件：编排核心唯一的对外可观察面（供 UI / CLI 订阅）

use serde::Serialize;

use crate::core::{PastStep, Step, SuspensionToken, TerminationReason};

/// 单个运行产生的事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 初始计划已安装
    Planned { steps: Vec<Step> },
    /// 即将把步骤交给 Worker
    Dispatching { step: Step },
    /// Worker 返回，PastStep 已追加
    StepCompleted { step: PastStep },
    /// 重规划替换了剩余计划
    Replanned { plan: Vec<Step> },
    /// 当前步骤挂起，等待外部回答
    Suspended {
        token: SuspensionToken,
        question: String,
    },
    /// 运行结束，report 为最终产物
    Completed {
        report: String,
        reason: TerminationReason,
    },
    /// 运行因 Oracle 错误或契约违规中止；检查点保留
    Failed { error: String },
}
