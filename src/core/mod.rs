//! 核心编排层：错误类型、构建器、后台 worker

pub mod builder;
pub mod error;
pub mod worker;

pub use builder::{create_llm_from_config, AgentBuilder};
pub use error::AgentError;
pub use worker::{spawn_worker, AgentHandle, Command};
