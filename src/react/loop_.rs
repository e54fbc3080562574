//! 编排主循环
//!
//! submit -> (Text: 结束) | (Action -> dispatch -> submit_follow_up -> ...)，
//! 连续动作数受 max_chain 限制；支持 Cancel；任何错误都在此转为用户可读文本，绝不向前端抛出。
//! 可选 event_tx：推送 ThinkingStarted / ActionCall / ActionResult / ThinkingFinished。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::actions::{ActionDispatcher, ActionRequest, ActionResult, FollowUpOffer};
use crate::core::AgentError;
use crate::react::{ConversationSession, FollowUp, LoopEvent, ModelReply};

/// 单个用户回合内默认的最大连续动作数
pub const DEFAULT_MAX_CHAIN: usize = 4;

/// 一个回合的最终输出：给用户的文本，以及可选的后续动作提议
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub text: String,
    pub offer: Option<FollowUpOffer>,
}

impl TurnReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offer: None,
        }
    }
}

pub struct Orchestrator {
    session: ConversationSession,
    dispatcher: Arc<ActionDispatcher>,
    max_chain: usize,
    event_tx: Option<UnboundedSender<LoopEvent>>,
}

fn send_event(tx: &Option<UnboundedSender<LoopEvent>>, ev: LoopEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

impl Orchestrator {
    pub fn new(session: ConversationSession, dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            session,
            dispatcher,
            max_chain: DEFAULT_MAX_CHAIN,
            event_tx: None,
        }
    }

    pub fn with_max_chain(mut self, max_chain: usize) -> Self {
        self.max_chain = max_chain;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn max_chain(&self) -> usize {
        self.max_chain
    }

    /// 处理一个用户回合，总是返回文本
    pub async fn run_turn(&mut self, user_text: &str) -> TurnReply {
        self.run_turn_with_cancel(user_text, CancellationToken::new()).await
    }

    pub async fn run_turn_with_cancel(&mut self, user_text: &str, cancel: CancellationToken) -> TurnReply {
        send_event(&self.event_tx, LoopEvent::ThinkingStarted);
        let outcome = self.try_run_turn(user_text, &cancel).await;
        self.finish(outcome)
    }

    /// 执行用户接受的后续动作提议，随后与模型完成一次确认往返
    pub async fn run_offer(&mut self, offer: &FollowUpOffer, cancel: CancellationToken) -> TurnReply {
        send_event(&self.event_tx, LoopEvent::ThinkingStarted);
        let request = ActionRequest::new(offer.action.clone(), offer.arguments.clone());
        self.session.record_action_call(request.clone());
        let outcome = self.drive_from_action(request, &cancel).await;
        self.finish(outcome)
    }

    /// 清空会话历史
    pub fn clear(&mut self) {
        self.session.clear();
    }

    fn finish(&self, outcome: Result<TurnReply, AgentError>) -> TurnReply {
        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "turn ended with error");
                let text = user_facing(&e);
                send_event(&self.event_tx, LoopEvent::Error { text: text.clone() });
                TurnReply::text(text)
            }
        };
        send_event(&self.event_tx, LoopEvent::ThinkingFinished);
        reply
    }

    async fn try_run_turn(&mut self, user_text: &str, cancel: &CancellationToken) -> Result<TurnReply, AgentError> {
        let reply = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            r = self.session.submit(user_text) => r?,
        };
        self.drive(reply, cancel).await
    }

    async fn drive_from_action(
        &mut self,
        request: ActionRequest,
        cancel: &CancellationToken,
    ) -> Result<TurnReply, AgentError> {
        let mut offer = None;
        let reply = self.round_trip(request, &mut offer, cancel).await?;
        self.drive_with(reply, offer, 1, cancel).await
    }

    async fn drive(&mut self, reply: ModelReply, cancel: &CancellationToken) -> Result<TurnReply, AgentError> {
        self.drive_with(reply, None, 0, cancel).await
    }

    /// 按链式往返推进，直到模型给出文本或超出上限
    async fn drive_with(
        &mut self,
        mut reply: ModelReply,
        mut offer: Option<FollowUpOffer>,
        mut chain: usize,
        cancel: &CancellationToken,
    ) -> Result<TurnReply, AgentError> {
        loop {
            match reply {
                ModelReply::Text { content } => return Ok(TurnReply { text: content, offer }),
                ModelReply::Action { request, .. } => {
                    if chain >= self.max_chain {
                        return Err(AgentError::ChainLimitExceeded(self.max_chain));
                    }
                    chain += 1;
                    reply = self.round_trip(request, &mut offer, cancel).await?;
                }
            }
        }
    }

    /// 一次完整的动作往返：dispatch -> 回灌结果 -> 取模型下一条回复
    async fn round_trip(
        &mut self,
        request: ActionRequest,
        offer: &mut Option<FollowUpOffer>,
        cancel: &CancellationToken,
    ) -> Result<ModelReply, AgentError> {
        send_event(
            &self.event_tx,
            LoopEvent::ActionCall {
                name: request.name.clone(),
                arguments: request.arguments.clone(),
            },
        );

        let result: ActionResult = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            r = self.dispatcher.dispatch(&request) => r,
        };

        send_event(
            &self.event_tx,
            LoopEvent::ActionResult {
                name: request.name.clone(),
                ok: result.is_success(),
                message: result.message().to_string(),
            },
        );
        if let Some(o) = result.offer() {
            *offer = Some(o.clone());
        }

        let follow_up = FollowUp::new(request.name, result);
        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            r = self.session.submit_follow_up(follow_up) => r,
        }
    }
}

/// 循环层错误转为给用户看的短句
pub fn user_facing(err: &AgentError) -> String {
    match err {
        AgentError::Timeout => "Sorry, the request timed out. Please try again.".to_string(),
        AgentError::ChainLimitExceeded(limit) => {
            format!("Sorry, I stopped after too many chained actions (limit {limit}).")
        }
        AgentError::Cancelled => "Request cancelled.".to_string(),
        AgentError::EmptyResponse => "Sorry, I didn't get a response. Please try again.".to_string(),
        AgentError::Llm(e) => format!("Sorry, I couldn't reach the language model: {e}"),
        other => format!("Sorry, something went wrong: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::actions::{
        ActionFailure, ActionHandler, ActionPayload, ActionRegistry, ActionSpec, ValidatedArgs,
    };
    use crate::llm::{LlmError, MockLlmClient, ModelResponse};

    struct Noop;

    #[async_trait::async_trait]
    impl ActionHandler for Noop {
        async fn execute(&self, _args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
            Ok(ActionPayload::message("done"))
        }
    }

    fn orchestrator(mock: Arc<MockLlmClient>) -> Orchestrator {
        let mut reg = ActionRegistry::new();
        reg.register(ActionSpec::new("noop", "does nothing"), Arc::new(Noop)).unwrap();
        let reg = Arc::new(reg);
        let session = ConversationSession::new(mock, reg.clone(), "", Duration::from_secs(5));
        let dispatcher = Arc::new(ActionDispatcher::new(reg, Duration::from_secs(5)));
        Orchestrator::new(session, dispatcher)
    }

    #[tokio::test]
    async fn test_events_bracket_the_turn() {
        let mock = Arc::new(MockLlmClient::scripted([
            ModelResponse::call("noop", json!({})),
            ModelResponse::text("All set."),
        ]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut o = orchestrator(mock).with_event_tx(tx);
        let reply = o.run_turn("go").await;
        assert_eq!(reply.text, "All set.");

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert_eq!(events.first(), Some(&LoopEvent::ThinkingStarted));
        assert_eq!(events.last(), Some(&LoopEvent::ThinkingFinished));
        assert!(events
            .iter()
            .any(|e| matches!(e, LoopEvent::ActionResult { name, ok: true, .. } if name == "noop")));
    }

    #[tokio::test]
    async fn test_model_failure_becomes_text() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::Request("connection refused".into()));
        let mut o = orchestrator(mock);
        let reply = o.run_turn("hi").await;
        assert!(reply.text.contains("connection refused"));
        assert!(reply.offer.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_turn_returns_text() {
        let mock = Arc::new(MockLlmClient::new().with_delay(Duration::from_secs(5)));
        let mut o = orchestrator(mock);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reply = o.run_turn_with_cancel("hi", cancel).await;
        assert_eq!(reply.text, "Request cancelled.");
    }

    #[tokio::test]
    async fn test_zero_chain_limit_rejects_any_action() {
        let mock = Arc::new(MockLlmClient::always(ModelResponse::call("noop", json!({}))));
        let mut o = orchestrator(mock.clone()).with_max_chain(0);
        let reply = o.run_turn("go").await;
        assert!(reply.text.contains("too many chained actions"));
        assert_eq!(mock.calls(), 1);
    }
}
