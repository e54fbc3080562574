//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；Gemini、DeepSeek、OpenAI 共用此实现。
//! 两种调用模式：
//! - Native：动作以 `tools` 声明，模型返回结构化 tool_calls
//! - Text：动作目录与 JSON 调用格式写入 system prompt，回复由 text_protocol 解析

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::CreateChatCompletionRequest;
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::actions::{ActionRequest, ActionSpec};
use crate::llm::text_protocol;
use crate::llm::{LlmClient, LlmError, ModelRequest, ModelResponse, ResponsePart};
use crate::memory::Turn;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// 动作调用模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallingMode {
    #[default]
    Native,
    Text,
}

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    mode: CallingMode,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            mode: CallingMode::Native,
            usage: TokenUsage::new(),
        }
    }

    pub fn with_mode(mut self, mode: CallingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn mode(&self) -> CallingMode {
        self.mode
    }

    /// 构造请求体（JSON 形式），便于脱离网络测试
    pub(crate) fn request_body(&self, request: &ModelRequest<'_>) -> Value {
        let text_mode = self.mode == CallingMode::Text && !request.actions.is_empty();

        let mut system = request.system_prompt.trim().to_string();
        if text_mode {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(&text_protocol::instructions(request.actions));
        }

        let mut messages = Vec::with_capacity(request.history.len() + 1);
        if !system.is_empty() {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.extend(request.history.iter().map(turn_message));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if self.mode == CallingMode::Native && !request.actions.is_empty() {
            body["tools"] = Value::Array(request.actions.iter().map(tool_declaration).collect());
        }
        body
    }

    /// `with_actions` 为 false 时（未声明任何动作）文本一律按原文返回
    pub(crate) fn parse_message(&self, message: &Value, with_actions: bool) -> ModelResponse {
        let mut parts = Vec::new();
        let content = message.get("content").and_then(Value::as_str).unwrap_or_default();

        if self.mode == CallingMode::Text && with_actions {
            parts.extend(text_protocol::parse_reply(content).parts);
        } else if !content.trim().is_empty() {
            parts.push(ResponsePart::Text(content.to_string()));
        }

        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let Some(function) = call.get("function") else { continue };
                let Some(name) = function.get("name").and_then(Value::as_str) else { continue };
                let raw = function.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                // 无法解析的参数原样保留为字符串，交给分发器的校验报告
                let arguments = if raw.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
                };
                parts.push(ResponsePart::ActionCall(ActionRequest::new(name, arguments)));
            }
        }

        ModelResponse { parts }
    }
}

fn turn_message(turn: &Turn) -> Value {
    let role = if turn.is_user_side() { "user" } else { "assistant" };
    json!({"role": role, "content": turn.text_for_model()})
}

fn tool_declaration(spec: &ActionSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters_schema(),
        }
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelResponse, LlmError> {
        let body = self.request_body(&request);
        let with_actions = !request.actions.is_empty();
        let request: CreateChatCompletionRequest =
            serde_json::from_value(body).map_err(|e| LlmError::Build(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;
        let message =
            serde_json::to_value(&choice.message).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(self.parse_message(&message, with_actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionResult, ParamSpec};

    fn specs() -> Vec<ActionSpec> {
        vec![ActionSpec::new("create_folder", "Create folders")
            .param(ParamSpec::string("location", "where").required())]
    }

    #[test]
    fn test_native_body_declares_tools_and_maps_roles() {
        let client = OpenAiClient::new(Some("http://localhost:1"), "m", Some("k"));
        let history = vec![
            Turn::user("make a folder"),
            Turn::action_call(ActionRequest::new("create_folder", json!({"location": "Desktop"})), None),
            Turn::action_result("create_folder", ActionResult::success(crate::actions::ActionPayload::message("ok")), "Function Result: ok"),
        ];
        let actions = specs();
        let body = client.request_body(&ModelRequest {
            system_prompt: "You are helpful.",
            history: &history,
            actions: &actions,
        });

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "Function Result: ok");
        assert_eq!(body["tools"][0]["function"]["name"], "create_folder");

        // 请求体必须能被 async_openai 接受
        let parsed: Result<CreateChatCompletionRequest, _> = serde_json::from_value(body);
        assert!(parsed.is_ok());
    }

    #[test]
    fn test_text_mode_puts_catalog_in_system_prompt() {
        let client = OpenAiClient::new(None, "m", Some("k")).with_mode(CallingMode::Text);
        let history = vec![Turn::user("hi")];
        let actions = specs();
        let body = client.request_body(&ModelRequest {
            system_prompt: "",
            history: &history,
            actions: &actions,
        });
        assert!(body.get("tools").is_none());
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("create_folder"));
    }

    #[test]
    fn test_parse_native_tool_calls() {
        let client = OpenAiClient::new(None, "m", Some("k"));
        let message = json!({
            "role": "assistant",
            "content": "Sure.",
            "tool_calls": [
                {"id": "1", "type": "function", "function": {"name": "create_folder", "arguments": "{\"location\":\"Desktop\"}"}},
                {"id": "2", "type": "function", "function": {"name": "open_website", "arguments": "not json"}}
            ]
        });
        let response = client.parse_message(&message, true);
        assert_eq!(response.joined_text(), "Sure.");
        let calls: Vec<_> = response.calls().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments["location"], "Desktop");
        assert_eq!(calls[1].arguments, Value::String("not json".into()));
    }

    #[test]
    fn test_text_mode_without_actions_keeps_reply_verbatim() {
        let client = OpenAiClient::new(None, "m", Some("k")).with_mode(CallingMode::Text);
        let code = "```python\ndef main():\n    payload = {\"action\": \"greet\", \"arguments\": {}}\n    print(payload)\n```";
        let message = json!({"role": "assistant", "content": code});

        let response = client.parse_message(&message, false);
        assert_eq!(response.calls().count(), 0);
        assert_eq!(response.joined_text(), code);

        // 声明了动作时同一段文本仍按调用协议解析
        let response = client.parse_message(&message, true);
        assert_eq!(response.calls().count(), 1);
    }
}
