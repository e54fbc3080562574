//! Mock LLM 客户端（用于测试与无密钥运行）
//!
//! - 按脚本依次返回预设回复；脚本耗尽后回显最后一条 User 文本
//! - 记录每次收到的请求，便于断言回灌内容与声明的动作集

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, ModelRequest, ModelResponse};
use crate::memory::{Turn, TurnRole};

/// 一次调用的快照
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub history: Vec<Turn>,
    pub actions: Vec<String>,
}

impl RecordedRequest {
    /// 最后一条 Turn 渲染给模型的文本
    pub fn last_text(&self) -> Option<String> {
        self.history.last().map(Turn::text_for_model)
    }
}

#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
    fallback: Option<ModelResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序返回给定回复
    pub fn scripted(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        let mock = Self::new();
        for r in responses {
            mock.push(r);
        }
        mock
    }

    /// 每次都返回同一回复（脚本优先）
    pub fn always(response: ModelResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, response: ModelResponse) {
        lock(&self.script).push_back(Ok(response));
    }

    pub fn push_error(&self, error: LlmError) {
        lock(&self.script).push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelResponse, LlmError> {
        lock(&self.requests).push(RecordedRequest {
            system_prompt: request.system_prompt.to_string(),
            history: request.history.to_vec(),
            actions: request.actions.iter().map(|a| a.name.clone()).collect(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(next) = lock(&self.script).pop_front() {
            return next;
        }
        if let Some(fallback) = &self.fallback {
            return Ok(fallback.clone());
        }

        let last_user = request
            .history
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::User)
            .map(Turn::text_for_model)
            .unwrap_or_else(|| "(no input)".to_string());
        Ok(ModelResponse::text(format!("Echo from Mock: {}", last_user)))
    }
}
