//! 文本动作协议
//!
//! 用于不支持原生 tool calling 的端点：动作目录与调用格式（JSON Schema）写入 system prompt，
//! 模型以 ```json {"action": ..., "arguments": {...}} ``` 形式回复。
//! 解析是宽松的：找不到合法调用的回复整体视为文本。

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::actions::{ActionRequest, ActionSpec};
use crate::llm::{ModelResponse, ResponsePart};

/// 文本协议下的一次动作调用
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ActionCallFormat {
    /// 要调用的动作名，必须取自动作目录
    pub action: String,
    /// 动作参数
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

/// 生成附加到 system prompt 的动作目录与调用格式说明
pub fn instructions(actions: &[ActionSpec]) -> String {
    let mut out = String::from("You can perform the following actions:\n");
    for spec in actions {
        out.push_str(&format!(
            "- {}: {}\n  parameters: {}\n",
            spec.name,
            spec.description,
            spec.parameters_schema()
        ));
    }

    let schema = schemars::schema_for!(ActionCallFormat);
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();
    out.push_str(
        "\nTo perform an action, reply with a single ```json code block matching this schema:\n",
    );
    out.push_str(&schema);
    out.push_str("\nOtherwise reply with plain text. Request at most one action per reply.");
    out
}

/// 解析模型文本回复
pub fn parse_reply(raw: &str) -> ModelResponse {
    let Some((start, end)) = call_span(raw) else {
        return text_only(raw);
    };

    let candidate = strip_fence(&raw[start..end]);
    let Some(call) = json_object(candidate).and_then(|obj| serde_json::from_str::<ActionCallFormat>(obj).ok()) else {
        return text_only(raw);
    };

    let mut parts = Vec::new();
    let preamble = format!("{}{}", &raw[..start], &raw[end..]);
    if !preamble.trim().is_empty() {
        parts.push(ResponsePart::Text(preamble.trim().to_string()));
    }
    let arguments = Value::Object(call.arguments.into_iter().collect());
    parts.push(ResponsePart::ActionCall(ActionRequest::new(call.action, arguments)));
    ModelResponse { parts }
}

fn text_only(raw: &str) -> ModelResponse {
    if raw.trim().is_empty() {
        ModelResponse::default()
    } else {
        ModelResponse::text(raw.trim())
    }
}

/// 调用所在区间：优先 ```json 代码块，其次第一个 `{` 到最后一个 `}`
fn call_span(raw: &str) -> Option<(usize, usize)> {
    if let Some(open) = raw.find("```json") {
        let body = open + "```json".len();
        if let Some(close) = raw[body..].find("```") {
            return Some((open, body + close + 3));
        }
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then_some((start, end + 1))
}

fn strip_fence(s: &str) -> &str {
    s.trim()
        .trim_start_matches("```json")
        .trim_end_matches("```")
        .trim()
}

fn json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}
