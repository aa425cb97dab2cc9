//! Mock 补全网关（用于测试，无需 API）
//!
//! 预置一串脚本化响应，complete 按顺序逐条弹出；
//! 用 Err(AuthRateLimit) 模拟限流，用工具调用消息驱动 CODE_PATH。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::{CompletionGateway, ToolsetSchema};
use crate::memory::ChatMessage;

/// 脚本化网关：按脚本顺序返回响应，记录调用次数
pub struct ScriptedGateway {
    script: Mutex<Vec<Result<ChatMessage, AgentError>>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(script: Vec<Result<ChatMessage, AgentError>>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    /// 已发起的请求次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _tools: Option<&ToolsetSchema>,
    ) -> Result<ChatMessage, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script lock")
            .pop()
            .unwrap_or_else(|| Ok(ChatMessage::assistant("（脚本已耗尽）")))
    }
}
