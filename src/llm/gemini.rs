//! Gemini 客户端：走 Google 提供的 OpenAI 兼容端点

use crate::llm::{CallingMode, OpenAiClient};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const GEMINI_FLASH: &str = "gemini-2.0-flash";

/// 创建 Gemini 客户端；密钥取 `GEMINI_API_KEY`，模型可由 `GEMINI_MODEL` 覆盖
pub fn create_gemini_client(model: Option<&str>, mode: CallingMode) -> OpenAiClient {
    let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| "placeholder".to_string());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("GEMINI_MODEL").ok())
        .unwrap_or_else(|| GEMINI_FLASH.to_string());

    OpenAiClient::new(Some(GEMINI_BASE_URL), &model, Some(api_key.as_str())).with_mode(mode)
}
