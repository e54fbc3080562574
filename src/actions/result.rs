//! 动作执行结果
//!
//! ActionResult 是 Dispatcher 对外的唯一结果形态：Success 携带 payload（消息 + 可选结构化字段 + 批量逐项结果），
//! Failure 携带显式的 ActionErrorKind，调用方据此决定重试、提示用户或仅记录日志。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 失败分类（显式标签，不使用裸字符串）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionErrorKind {
    InvalidArguments,
    NotFound,
    AlreadyExists,
    IoFailure,
    NetworkFailure,
    Unsupported,
    Internal,
}

impl ActionErrorKind {
    /// 从 std::io::Error 归类：NotFound / AlreadyExists 单独区分，其余归为 IoFailure
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            _ => Self::IoFailure,
        }
    }
}

impl std::fmt::Display for ActionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::IoFailure => "io_failure",
            Self::NetworkFailure => "network_failure",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// 动作失败：分类 + 面向用户的简短消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub kind: ActionErrorKind,
    pub message: String,
}

impl ActionFailure {
    pub fn new(kind: ActionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::InvalidArguments, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::NotFound, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::NetworkFailure, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Internal, message)
    }

    /// 带上下文地包装 io 错误
    pub fn io(context: &str, err: &std::io::Error) -> Self {
        Self::new(ActionErrorKind::from_io(err), format!("{context}: {err}"))
    }
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for ActionFailure {}

/// 批量动作中单个条目的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Ok,
    Failed { kind: ActionErrorKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// 条目标识（如文件夹名）
    pub target: String,
    #[serde(flatten)]
    pub status: ItemStatus,
    pub message: String,
}

impl ItemOutcome {
    pub fn ok(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: ItemStatus::Ok,
            message: message.into(),
        }
    }

    pub fn failed(target: impl Into<String>, failure: ActionFailure) -> Self {
        Self {
            target: target.into(),
            status: ItemStatus::Failed { kind: failure.kind },
            message: failure.message,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ItemStatus::Ok)
    }

    pub fn failure_kind(&self) -> Option<ActionErrorKind> {
        match self.status {
            ItemStatus::Ok => None,
            ItemStatus::Failed { kind } => Some(kind),
        }
    }
}

/// 处理器提议的后续动作（替代在处理器内部阻塞询问用户）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpOffer {
    /// 展示给用户的问题，如 "Do you want to open it now?"
    pub prompt: String,
    pub action: String,
    pub arguments: Value,
}

/// 成功结果：至少一条可读消息，可附加结构化字段、批量逐项结果与后续动作提议
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<FollowUpOffer>,
}

impl ActionPayload {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with_offer(mut self, offer: FollowUpOffer) -> Self {
        self.offer = Some(offer);
        self
    }

    /// 由逐项结果构造批量 payload，摘要消息统计成功/失败数
    pub fn batch(verb: &str, items: Vec<ItemOutcome>) -> Self {
        let ok = items.iter().filter(|i| i.is_ok()).count();
        let failed = items.len() - ok;
        let message = if failed == 0 {
            format!("{verb} {ok} item(s).")
        } else {
            format!("{verb} {ok} item(s); {failed} failed.")
        };
        Self {
            message,
            items,
            ..Default::default()
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// 统一的动作结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionResult {
    Success { payload: ActionPayload },
    Failure { kind: ActionErrorKind, message: String },
}

impl ActionResult {
    pub fn success(payload: ActionPayload) -> Self {
        Self::Success { payload }
    }

    pub fn failure(kind: ActionErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<ActionErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn payload(&self) -> Option<&ActionPayload> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    /// 可读消息（成功时为 payload.message，失败时为失败消息）
    pub fn message(&self) -> &str {
        match self {
            Self::Success { payload } => &payload.message,
            Self::Failure { message, .. } => message,
        }
    }

    pub fn offer(&self) -> Option<&FollowUpOffer> {
        self.payload().and_then(|p| p.offer.as_ref())
    }

    /// 序列化为 JSON 文本，用于回灌给模型
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"message\":{:?}}}", self.message()))
    }
}

impl From<Result<ActionPayload, ActionFailure>> for ActionResult {
    fn from(r: Result<ActionPayload, ActionFailure>) -> Self {
        match r {
            Ok(payload) => Self::Success { payload },
            Err(f) => Self::Failure {
                kind: f.kind,
                message: f.message,
            },
        }
    }
}
