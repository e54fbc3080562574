//! 认知层：会话（Turn 历史 + 模型端点）与编排主循环

pub mod events;
pub mod loop_;
pub mod session;

pub use events::LoopEvent;
pub use loop_::{user_facing, Orchestrator, TurnReply, DEFAULT_MAX_CHAIN};
pub use session::{ConversationSession, FollowUp, ModelReply};
