//! 核心层：错误类型、提示词增强与对话轮次编排

pub mod error;
pub mod orchestrator;
pub mod prompt;

pub use error::AgentError;
pub use orchestrator::{ChatSession, DEFAULT_RETRY_BACKOFF_SECS};
