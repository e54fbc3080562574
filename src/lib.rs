//! Deskhand - 桌面助手的函数调用分发核心
//!
//! 模块划分：
//! - **actions**: 动作描述、注册表、分发器与具体动作（文件夹、Python 文件、网站、抓取、浏览器）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、Agent 构建器、后台 worker
//! - **llm**: 模型端点抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock）
//! - **memory**: 会话内有序 Turn 历史
//! - **observability**: tracing 初始化
//! - **react**: 会话与编排主循环

pub mod actions;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;

pub use crate::core::{spawn_worker, AgentBuilder, AgentError, AgentHandle, Command};
pub use crate::react::{Orchestrator, TurnReply};
