//! 对话历史
//!
//! Turn 是对话中的一个记录单元（user / assistant / action_call / action_result）。
//! ConversationHistory 只追加、严格按因果顺序；仅在会话拆除（clear）时整体清空。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actions::{ActionRequest, ActionResult};

/// Turn 角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    ActionCall,
    ActionResult,
}

/// Turn 内容：文本、动作调用或动作结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnContent {
    Text {
        text: String,
    },
    ActionCall {
        request: ActionRequest,
        /// 模型在调用之外附带的文字（可能为空）
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preamble: Option<String>,
    },
    ActionResult {
        name: String,
        result: ActionResult,
        /// 实际发给模型的回灌文本（结果 JSON + 起草确认消息的指令）
        prompt: String,
    },
}

/// 单条 Turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: TurnContent,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, TurnContent::Text { text: text.into() })
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, TurnContent::Text { text: text.into() })
    }

    pub fn action_call(request: ActionRequest, preamble: Option<String>) -> Self {
        Self::new(TurnRole::ActionCall, TurnContent::ActionCall { request, preamble })
    }

    pub fn action_result(name: impl Into<String>, result: ActionResult, prompt: impl Into<String>) -> Self {
        Self::new(
            TurnRole::ActionResult,
            TurnContent::ActionResult {
                name: name.into(),
                result,
                prompt: prompt.into(),
            },
        )
    }

    fn new(role: TurnRole, content: TurnContent) -> Self {
        Self {
            role,
            content,
            at: Utc::now(),
        }
    }

    /// 渲染为发给模型的文本
    pub fn text_for_model(&self) -> String {
        match &self.content {
            TurnContent::Text { text } => text.clone(),
            TurnContent::ActionCall { request, preamble } => {
                let call = format!(
                    "Calling action `{}` with arguments {}",
                    request.name, request.arguments
                );
                match preamble {
                    Some(p) if !p.trim().is_empty() => format!("{}\n{}", p.trim(), call),
                    _ => call,
                }
            }
            TurnContent::ActionResult { prompt, .. } => prompt.clone(),
        }
    }

    /// 从模型视角看这条 Turn 是否由用户一侧发出
    pub fn is_user_side(&self) -> bool {
        matches!(self.role, TurnRole::User | TurnRole::ActionResult)
    }
}

/// 会话私有的有序历史
#[derive(Clone, Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// 会话拆除时调用
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
