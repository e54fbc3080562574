//! 模型端点抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / DeepSeek / Mock）实现 LlmClient::send：
//! 输入 system prompt + Turn 历史 + 声明的动作集，输出若干 ResponsePart（文本或结构化动作调用）。
//! 把 ResponsePart 归一化为 ModelReply 是 Session 的职责。

use async_trait::async_trait;
use thiserror::Error;

use crate::actions::{ActionRequest, ActionSpec};
use crate::memory::Turn;

/// 端点层错误
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to build request: {0}")]
    Build(String),
}

/// 一次模型调用的输入
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system_prompt: &'a str,
    pub history: &'a [Turn],
    /// 本会话配置的全部动作；为空表示纯文本补全
    pub actions: &'a [ActionSpec],
}

/// 模型回复中的一段
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    ActionCall(ActionRequest),
}

/// 模型原始回复：保留全部片段，是否只执行第一个调用由 Session 决定
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub parts: Vec<ResponsePart>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ResponsePart::Text(text.into())],
        }
    }

    pub fn call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            parts: vec![ResponsePart::ActionCall(ActionRequest::new(name, arguments))],
        }
    }

    pub fn with_part(mut self, part: ResponsePart) -> Self {
        self.parts.push(part);
        self
    }

    /// 所有文本片段按顺序拼接
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text(t) => Some(t.trim()),
                ResponsePart::ActionCall(_) => None,
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn calls(&self) -> impl Iterator<Item = &ActionRequest> {
        self.parts.iter().filter_map(|p| match p {
            ResponsePart::ActionCall(c) => Some(c),
            ResponsePart::Text(_) => None,
        })
    }
}

/// 模型端点
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelResponse, LlmError>;

    /// 累计 token 使用：(prompt, completion, total)；默认不统计
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 单轮纯文本补全（不声明任何动作），供需要生成内容的处理器使用
pub async fn complete_text(llm: &dyn LlmClient, prompt: &str) -> Result<String, LlmError> {
    let history = [Turn::user(prompt)];
    let response = llm
        .send(ModelRequest {
            system_prompt: "",
            history: &history,
            actions: &[],
        })
        .await?;
    Ok(response.joined_text())
}
