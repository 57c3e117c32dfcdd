//! Hive - 计划 / 执行 / 重规划 多 Worker 编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 执行状态、Worker 注册表、路由、挂起令牌、检查点、编排主循环
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 对话消息与只追加的上下文日志
//! - **observability**: 日志初始化
//! - **planning**: 规划 / 重规划 / 总结 Oracle 及其校验
//! - **workers**: Worker 调用契约、执行器、LLM Worker 与人工 Worker

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planning;
pub mod workers;
