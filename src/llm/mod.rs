//! LLM 层：模型端点抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock）

pub mod deepseek;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod text_protocol;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use gemini::{create_gemini_client, GEMINI_FLASH};
pub use mock::{MockLlmClient, RecordedRequest};
pub use openai::{CallingMode, OpenAiClient, TokenUsage};
pub use traits::{complete_text, LlmClient, LlmError, ModelRequest, ModelResponse, ResponsePart};
