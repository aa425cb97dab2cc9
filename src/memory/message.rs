//! 对话消息类型
//!
//! 所有生产者（用户输入、补全网关、工具调用器）统一产出 ChatMessage，
//! 避免按消息表示形式分支；工具调用与工具结果通过 tool_calls / tool_call_id 关联。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// 模型请求的一次工具调用：名称 + JSON 编码参数 + 关联 id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// 原始 JSON 字符串，由编排器负责解析
    pub arguments: String,
}

/// 单条消息：文本内容 + 可选的工具调用描述 / 工具结果关联
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// 助手消息携带的工具调用（网关契约：至多采纳一条）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// 工具结果消息回指的调用 id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// 工具结果消息对应的工具名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// 携带一次工具调用的助手消息
    pub fn assistant_tool_call(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: vec![call],
            tool_call_id: None,
            name: None,
        }
    }

    /// 工具结果消息，回指调用 id 与工具名
    pub fn tool_result(call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
            name: Some(name.into()),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// 是否携带工具调用
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// 是否为工具调用或工具结果消息（delete_tool_messages 的剔除对象）
    pub fn is_tool_related(&self) -> bool {
        self.role == Role::Tool || self.has_tool_calls()
    }

    /// token 估算用的字符串化近似：序列化整条消息
    /// （含工具调用描述时只是近似值，与真实序列化大小允许存在偏差）
    pub fn rendered(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.content.clone())
    }
}
