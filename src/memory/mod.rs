//! 记忆层：消息类型、token 预算对话缓冲区、项目转写文档

pub mod buffer;
pub mod estimator;
pub mod message;
pub mod project;

pub use buffer::{ConversationBuffer, TokenCounter};
pub use estimator::TokenEstimator;
pub use message::{ChatMessage, Role, ToolCall};
pub use project::{default_doc_root, ProjectDoc};
