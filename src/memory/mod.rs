//! 记忆层：会话内的有序 Turn 历史

pub mod conversation;

pub use conversation::{ConversationHistory, Turn, TurnContent, TurnRole};
