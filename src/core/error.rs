//! Agent 错误类型
//!
//! 动作失败不在此列：它们以 ActionResult::Failure 回灌给模型。
//! 这里只包含会话 / 循环层面的错误，由 Orchestrator 转成用户可读文本。

use thiserror::Error;

use crate::actions::RegistryError;
use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Model request timed out")]
    Timeout,

    /// 单个用户回合内连续动作数超过上限
    #[error("Too many chained actions (limit {0})")]
    ChainLimitExceeded(usize),

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
