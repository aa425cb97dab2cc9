//! 补全网关抽象
//!
//! 编排器只依赖该契约：提交 (model, messages, 可选工具 schema 与选择策略)，
//! 换回一条消息 —— 文本回答，或携带至多一次工具调用。
//! 认证/限流失败以 AgentError::AuthRateLimit 区分，其余失败直接传播。

use async_trait::async_trait;

use crate::core::AgentError;
use crate::memory::ChatMessage;

/// 提交给网关的工具 schema 列表与选择策略
#[derive(Clone, Debug)]
pub struct ToolsetSchema {
    /// 每项为 {"type": "function", "function": {...}} 形式的 JSON 描述
    pub functions: Vec<serde_json::Value>,
    /// 工具选择策略，通常为 "auto"
    pub tool_choice: String,
}

impl ToolsetSchema {
    pub fn auto(functions: Vec<serde_json::Value>) -> Self {
        Self {
            functions,
            tool_choice: "auto".to_string(),
        }
    }
}

/// 补全网关 trait：一次请求换回一条响应消息
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&ToolsetSchema>,
    ) -> Result<ChatMessage, AgentError>;
}
