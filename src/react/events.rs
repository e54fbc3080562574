//! 循环过程事件：供前端展示思考指示、动作调用与结果

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// 开始处理一个用户回合
    ThinkingStarted,
    /// 回合结束（无论成功与否）
    ThinkingFinished,
    /// 即将分发动作
    ActionCall {
        name: String,
        arguments: serde_json::Value,
    },
    /// 动作返回
    ActionResult { name: String, ok: bool, message: String },
    Error { text: String },
}
