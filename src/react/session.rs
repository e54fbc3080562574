//! 会话：持有有序 Turn 历史与模型端点
//!
//! submit / submit_follow_up 先追加输入 Turn，再调用模型，最后追加 assistant / action_call Turn；
//! 模型原始回复在这里统一归一化为 ModelReply，下游只对封闭的变体做 match。
//! 会话不是并发安全的：同一会话上的调用必须串行（由 Orchestrator / worker 保证）。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use crate::actions::{ActionRegistry, ActionRequest, ActionResult};
use crate::core::AgentError;
use crate::llm::{LlmClient, ModelRequest, ModelResponse};
use crate::memory::{ConversationHistory, Turn};

/// 归一化后的模型回复
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text { content: String },
    Action {
        request: ActionRequest,
        /// 与调用一同返回的文字
        preamble: Option<String>,
    },
}

/// 一次动作往返的后半段：把结果回灌给模型
#[derive(Debug, Clone)]
pub struct FollowUp {
    pub action: String,
    pub result: ActionResult,
    pub prompt: String,
}

impl FollowUp {
    pub fn new(action: impl Into<String>, result: ActionResult) -> Self {
        let prompt = format!(
            "Function Result: {} So, draft a small confirming message.",
            result.to_json()
        );
        Self {
            action: action.into(),
            result,
            prompt,
        }
    }
}

pub struct ConversationSession {
    id: String,
    llm: Arc<dyn LlmClient>,
    registry: Arc<ActionRegistry>,
    system_prompt: String,
    history: ConversationHistory,
    request_timeout: Duration,
}

impl ConversationSession {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ActionRegistry>,
        system_prompt: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            llm,
            registry,
            system_prompt: system_prompt.into(),
            history: ConversationHistory::new(),
            request_timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &[Turn] {
        self.history.turns()
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 提交用户输入
    pub async fn submit(&mut self, text: &str) -> Result<ModelReply, AgentError> {
        self.history.push(Turn::user(text));
        self.exchange().await
    }

    /// 把动作结果作为合成的用户侧消息回灌，取得模型的后续回复
    pub async fn submit_follow_up(&mut self, follow_up: FollowUp) -> Result<ModelReply, AgentError> {
        let FollowUp { action, result, prompt } = follow_up;
        self.history.push(Turn::action_result(action, result, prompt));
        self.exchange().await
    }

    /// 记录一次非模型发起的动作调用（例如用户接受了 FollowUpOffer）
    pub fn record_action_call(&mut self, request: ActionRequest) {
        self.history.push(Turn::action_call(request, None));
    }

    /// 会话拆除：清空历史
    pub fn clear(&mut self) {
        self.history.clear();
        tracing::info!(session = %self.id, "conversation cleared");
    }

    async fn exchange(&mut self) -> Result<ModelReply, AgentError> {
        tracing::debug!(session = %self.id, turns = self.history.len(), "sending to model");
        let request = ModelRequest {
            system_prompt: &self.system_prompt,
            history: self.history.turns(),
            actions: self.registry.all_specs(),
        };

        let response = timeout(self.request_timeout, self.llm.send(request))
            .await
            .map_err(|_| AgentError::Timeout)??;

        let (reply, turn) = normalize(response)?;
        self.history.push(turn);
        reply.ok_or(AgentError::EmptyResponse)
    }
}

/// 首个结构化调用胜出；其余调用记录 warn 后忽略
fn normalize(response: ModelResponse) -> Result<(Option<ModelReply>, Turn), AgentError> {
    let text = response.joined_text();
    let mut calls = response.calls();

    let Some(first) = calls.next().cloned() else {
        if text.is_empty() {
            // 空回复同样入历史，保持与实际收到的一致
            return Ok((None, Turn::assistant("")));
        }
        return Ok((Some(ModelReply::Text { content: text.clone() }), Turn::assistant(text)));
    };

    let ignored: Vec<&str> = calls.map(|c| c.name.as_str()).collect();
    if !ignored.is_empty() {
        tracing::warn!(action = %first.name, ignored = ?ignored, "multiple action calls in one reply; only the first is executed");
    }

    let preamble = (!text.is_empty()).then_some(text);
    let turn = Turn::action_call(first.clone(), preamble.clone());
    Ok((
        Some(ModelReply::Action {
            request: first,
            preamble,
        }),
        turn,
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::actions::ActionPayload;
    use crate::llm::{LlmError, MockLlmClient, ResponsePart};
    use crate::memory::TurnRole;

    fn session(mock: Arc<MockLlmClient>) -> ConversationSession {
        ConversationSession::new(mock, Arc::new(ActionRegistry::new()), "sys", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_text_reply_appends_user_then_assistant() {
        let mock = Arc::new(MockLlmClient::scripted([ModelResponse::text("Hello!")]));
        let mut s = session(mock.clone());
        let reply = s.submit("hi").await.unwrap();
        assert_eq!(reply, ModelReply::Text { content: "Hello!".into() });
        let roles: Vec<_> = s.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::Assistant]);
        assert_eq!(mock.requests()[0].system_prompt, "sys");
    }

    #[tokio::test]
    async fn test_first_call_wins_and_text_becomes_preamble() {
        let response = ModelResponse::text("On it.")
            .with_part(ResponsePart::ActionCall(ActionRequest::new("a", json!({}))))
            .with_part(ResponsePart::ActionCall(ActionRequest::new("b", json!({}))));
        let mock = Arc::new(MockLlmClient::scripted([response]));
        let mut s = session(mock);
        match s.submit("do it").await.unwrap() {
            ModelReply::Action { request, preamble } => {
                assert_eq!(request.name, "a");
                assert_eq!(preamble.as_deref(), Some("On it."));
            }
            other => panic!("unexpected reply {other:?}"),
        }
        assert_eq!(s.history()[1].role, TurnRole::ActionCall);
    }

    #[tokio::test]
    async fn test_follow_up_records_result_turn_with_prompt() {
        let mock = Arc::new(MockLlmClient::scripted([ModelResponse::text("Done.")]));
        let mut s = session(mock.clone());
        s.record_action_call(ActionRequest::new("x", json!({})));
        let result = ActionResult::success(ActionPayload::message("ok"));
        s.submit_follow_up(FollowUp::new("x", result)).await.unwrap();

        let sent = mock.requests()[0].last_text().unwrap();
        assert!(sent.starts_with("Function Result: "));
        assert!(sent.ends_with("So, draft a small confirming message."));
        let roles: Vec<_> = s.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::ActionCall, TurnRole::ActionResult, TurnRole::Assistant]);
    }

    #[tokio::test]
    async fn test_empty_reply_is_error_but_recorded() {
        let mock = Arc::new(MockLlmClient::scripted([ModelResponse::default()]));
        let mut s = session(mock);
        assert!(matches!(s.submit("hi").await, Err(AgentError::EmptyResponse)));
        assert_eq!(s.history().len(), 2);
    }

    #[tokio::test]
    async fn test_model_error_and_timeout() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::Request("unreachable".into()));
        let mut s = session(mock);
        assert!(matches!(s.submit("hi").await, Err(AgentError::Llm(_))));

        let slow = Arc::new(MockLlmClient::new().with_delay(Duration::from_secs(5)));
        let mut s = ConversationSession::new(slow, Arc::new(ActionRegistry::new()), "", Duration::from_millis(20));
        assert!(matches!(s.submit("hi").await, Err(AgentError::Timeout)));
    }
}
