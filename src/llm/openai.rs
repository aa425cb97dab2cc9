//! OpenAI 兼容补全网关
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；
//! 请求时附带工具 schema 与选择策略，响应中至多采纳一条工具调用。
//! 认证 / 限流类 API 错误映射为 AgentError::AuthRateLimit。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionToolChoiceOption, ChatCompletionTools,
    CreateChatCompletionRequestArgs, FunctionCall, ToolChoiceOptions,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::{CompletionGateway, ToolsetSchema};
use crate::memory::{ChatMessage, Role, ToolCall};

/// OpenAI 兼容网关：持有 Client，complete 时转 ChatMessage 为 API 格式并取首条响应
pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
}

impl OpenAiGateway {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
        }
    }

    fn to_openai_messages(&self, messages: &[ChatMessage]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                Role::Assistant => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    args.content(m.content.clone());
                    if m.has_tool_calls() {
                        args.tool_calls(
                            m.tool_calls
                                .iter()
                                .map(|c| {
                                    ChatCompletionMessageToolCalls::Function(
                                        ChatCompletionMessageToolCall {
                                            id: c.id.clone(),
                                            function: FunctionCall {
                                                name: c.name.clone(),
                                                arguments: c.arguments.clone(),
                                            },
                                        },
                                    )
                                })
                                .collect::<Vec<_>>(),
                        );
                    }
                    ChatCompletionRequestMessage::Assistant(args.build().unwrap())
                }
                Role::Tool => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(m.content.clone())
                        .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
                        .build()
                        .unwrap(),
                ),
            })
            .collect()
    }

    fn to_tool_choice(policy: &str) -> ChatCompletionToolChoiceOption {
        let mode = match policy {
            "none" => ToolChoiceOptions::None,
            "required" => ToolChoiceOptions::Required,
            _ => ToolChoiceOptions::Auto,
        };
        ChatCompletionToolChoiceOption::Mode(mode)
    }

    fn map_error(e: OpenAIError) -> AgentError {
        match &e {
            OpenAIError::ApiError(api) => {
                let kind = api.r#type.clone().unwrap_or_default();
                let text = format!("{} {}", kind, api.message).to_lowercase();
                if text.contains("rate limit")
                    || text.contains("rate_limit")
                    || text.contains("authentication")
                    || text.contains("invalid_api_key")
                    || text.contains("insufficient_quota")
                {
                    AgentError::AuthRateLimit(api.message.clone())
                } else {
                    AgentError::Gateway(e.to_string())
                }
            }
            _ => AgentError::Gateway(e.to_string()),
        }
    }
}

#[async_trait]
impl CompletionGateway for OpenAiGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&ToolsetSchema>,
    ) -> Result<ChatMessage, AgentError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(model).messages(self.to_openai_messages(messages));

        if let Some(schema) = tools {
            let tools: Vec<ChatCompletionTools> = schema
                .functions
                .iter()
                .cloned()
                .map(serde_json::from_value)
                .collect::<Result<_, _>>()
                .map_err(|e| AgentError::Gateway(format!("工具 schema 无法序列化: {}", e)))?;
            builder
                .tools(tools)
                .tool_choice(Self::to_tool_choice(&schema.tool_choice));
        }

        let request = builder
            .build()
            .map_err(|e| AgentError::Gateway(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(Self::map_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Gateway("响应中没有任何补全结果".to_string()))?;

        // 至多采纳一条工具调用（只认函数调用，忽略 custom 工具）
        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| match c {
                ChatCompletionMessageToolCalls::Function(call) => Some(ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                }),
                ChatCompletionMessageToolCalls::Custom(_) => None,
            })
            .take(1)
            .collect();

        Ok(ChatMessage {
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
            name: None,
        })
    }
}
