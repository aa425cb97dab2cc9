//! 工具调用器
//!
//! 按名解析注册表中的工具并执行；任何失败（未知工具、执行异常）都不向上传播，
//! 而是转写为带错误标记的工具结果文本，交由编排器的 debug 分支处理。
//! 每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::llm::ToolsetSchema;
use crate::memory::{ChatMessage, ToolCall};
use crate::tools::{ExecutionContext, ToolRegistry};

/// 工具执行失败时结果文本的固定前缀
pub const TOOL_ERROR_PREFIX: &str = "函数运行报错如下:";

/// 错误哨兵：结果文本包含该子串即视为工具执行失败
pub const ERROR_MARKER: &str = "报错";

/// 工具调用器：持有注册表与会话执行上下文
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    context: ExecutionContext,
}

impl ToolInvoker {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            context: ExecutionContext::new(),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// 生成网关用的工具 schema；注册表为空时不附带工具
    pub fn toolset_schema(&self) -> Option<ToolsetSchema> {
        if self.registry.is_empty() {
            None
        } else {
            Some(ToolsetSchema::auto(self.registry.function_schemas()))
        }
    }

    /// 执行一次工具调用，返回工具结果消息。
    /// args 为编排器已解析好的 JSON 参数；失败以错误标记文本落入 content。
    pub async fn invoke(&self, call: &ToolCall, args: Value) -> ChatMessage {
        let start = Instant::now();

        let tool = self.registry.get(&call.name);
        let declared_writes = tool
            .as_ref()
            .map(|t| t.slot_access().writes)
            .unwrap_or_default();

        let result = match tool {
            Some(tool) => tool.execute(args.clone(), &self.context).await,
            None => Err(format!("未找到名为 {} 的工具", call.name)),
        };

        let (ok, content) = match result {
            Ok(output) => (true, output),
            Err(e) => (false, format!("{}{}", TOOL_ERROR_PREFIX, e)),
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "ok": ok,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&args),
            "slot_writes": declared_writes,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        ChatMessage::tool_result(call.id.clone(), call.name.clone(), content)
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tracing_subscriber::fmt::MakeWriter;

    use crate::tools::{SlotAccess, Tool};

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "boom"
        }

        fn description(&self) -> &str {
            "总是失败"
        }

        async fn execute(&self, _args: Value, _ctx: &ExecutionContext) -> Result<String, String> {
            Err("no such table: user_payments".to_string())
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "c1".into(),
            name: name.into(),
            arguments: "{}".into(),
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_sentinel_text() {
        let mut registry = ToolRegistry::new();
        registry.register(FailingTool);
        let invoker = ToolInvoker::new(registry);

        let msg = invoker.invoke(&call("boom"), serde_json::json!({})).await;
        assert!(msg.content.starts_with(TOOL_ERROR_PREFIX));
        assert!(msg.content.contains(ERROR_MARKER));
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_sentinel_text() {
        let invoker = ToolInvoker::new(ToolRegistry::new());
        let msg = invoker.invoke(&call("missing"), serde_json::json!({})).await;
        assert!(msg.content.contains(ERROR_MARKER));
    }

    struct SlotWritingTool;

    #[async_trait]
    impl Tool for SlotWritingTool {
        fn name(&self) -> &str {
            "extract_data"
        }

        fn description(&self) -> &str {
            "写入结果表槽位"
        }

        fn slot_access(&self) -> SlotAccess {
            SlotAccess::writes(&["结果表槽位"])
        }

        async fn execute(&self, _args: Value, _ctx: &ExecutionContext) -> Result<String, String> {
            Ok("完成".to_string())
        }
    }

    /// 把 tracing 输出捕获到内存缓冲区
    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_audit_log_lists_declared_slot_writes() {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut registry = ToolRegistry::new();
        registry.register(SlotWritingTool);
        let invoker = ToolInvoker::new(registry);
        invoker
            .invoke(&call("extract_data"), serde_json::json!({}))
            .await;

        let output =
            String::from_utf8(writer.0.lock().expect("capture lock").clone()).unwrap();
        assert!(output.contains("slot_writes"));
        assert!(output.contains("结果表槽位"));
    }
}
