//! LLM 层：补全网关契约与实现（OpenAI 兼容 / 脚本化 Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::ScriptedGateway;
pub use openai::OpenAiGateway;
pub use traits::{CompletionGateway, ToolsetSchema};
