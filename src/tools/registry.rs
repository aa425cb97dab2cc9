//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找；编排器侧只读消费，通过 ToolInvoker 调用。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::context::{ExecutionContext, SlotAccess};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、声明的上下文槽位、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（工具调用中的 name 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 该工具读写的上下文槽位声明
    fn slot_access(&self) -> SlotAccess {
        SlotAccess::default()
    }

    /// 执行工具：args 为已解析的 JSON 参数，ctx 为会话执行上下文
    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<String, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 生成提交给补全网关的工具 schema 列表
    pub fn function_schemas(&self) -> Vec<Value> {
        let mut entries: Vec<(&String, &Arc<dyn Tool>)> = self.tools.iter().collect();
        entries.sort_by_key(|(name, _)| name.to_string());
        entries
            .into_iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": name,
                        "description": tool.description(),
                        "parameters": tool.parameters_schema(),
                    }
                })
            })
            .collect()
    }
}
