//! iQuery Agent 门面
//!
//! 把网关、工具调用器、交互边界与对话缓冲区组装成一个可反复提问的代理：
//! 单问单答（chat 带问题）或交互式多轮（chat 不带问题，直到用户输入「退出」）。
//! 每个逻辑轮次交给 ChatSession 状态机执行，轮次结束后缓冲区累积延续。

use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{AgentError, ChatSession};
use crate::llm::CompletionGateway;
use crate::memory::{ChatMessage, ConversationBuffer, ProjectDoc};
use crate::tools::ToolInvoker;
use crate::ui::Interaction;

/// 按模型名推断缓冲区 token 阈值
pub fn token_threshold_for_model(model: &str) -> usize {
    if model.contains("1106") || model.contains("turbo-preview") {
        110_000
    } else if model.contains("16k") {
        12_000
    } else if model.contains("gpt-4") {
        7_000
    } else {
        3_000
    }
}

/// iQuery 数据分析代理
pub struct IqueryAgent {
    model: String,
    buffer: ConversationBuffer,
    system_contents: Vec<String>,
    gateway: Box<dyn CompletionGateway>,
    invoker: ToolInvoker,
    console: Box<dyn Interaction>,
    developer_mode: bool,
    expert_mode: bool,
    retry_backoff: Duration,
}

impl IqueryAgent {
    /// 组装代理：system_contents 为系统前缀（通常是数据字典等背景材料）
    pub fn new(
        config: &AppConfig,
        system_contents: Vec<String>,
        gateway: Box<dyn CompletionGateway>,
        invoker: ToolInvoker,
        console: Box<dyn Interaction>,
    ) -> Self {
        let model = config.llm.model.clone();
        let threshold = config
            .agent
            .token_threshold
            .unwrap_or_else(|| token_threshold_for_model(&model));
        let buffer = ConversationBuffer::new(&system_contents, Some(threshold));

        Self {
            model,
            buffer,
            system_contents,
            gateway,
            invoker,
            console,
            developer_mode: config.agent.developer_mode,
            expert_mode: config.agent.expert_mode,
            retry_backoff: Duration::from_secs(config.agent.retry_backoff_secs),
        }
    }

    /// 欢迎语
    pub fn greet(&self) {
        self.console.show(&format!(
            "您好，我是iQuery数据分析Agent，当前模型为 {}，很高兴为您服务。",
            self.model
        ));
    }

    /// 提问并执行一个逻辑轮次；question 为 None 时进入交互式多轮对话。
    /// 轮次的全部落账结果累积进代理缓冲区，供后续提问延续上下文。
    pub async fn chat(&mut self, question: Option<&str>) -> Result<(), AgentError> {
        match question {
            Some(q) => self.run_one_turn(q).await,
            None => self.chat_interactive().await,
        }
    }

    async fn chat_interactive(&mut self) -> Result<(), AgentError> {
        self.greet();
        loop {
            let question = self.console.ask("请输入您的问题（输入「退出」结束对话）：");
            if question == "退出" || question.is_empty() {
                self.console.show("再见，期待下次为您服务。");
                return Ok(());
            }
            self.run_one_turn(&question).await?;
        }
    }

    async fn run_one_turn(&mut self, question: &str) -> Result<(), AgentError> {
        tracing::info!(model = %self.model, "开始新一轮问答");
        self.buffer.append(ChatMessage::user(question));

        let session = ChatSession::new(
            &self.model,
            self.gateway.as_ref(),
            &self.invoker,
            self.console.as_ref(),
        )
        .with_developer_mode(self.developer_mode)
        .with_expert_mode(self.expert_mode)
        .with_retry_backoff(self.retry_backoff);

        // 取走缓冲区交给状态机，终结后换回累积结果
        let buffer = std::mem::replace(
            &mut self.buffer,
            ConversationBuffer::new(&[], None),
        );
        self.buffer = session.run_turn(buffer).await?;
        Ok(())
    }

    /// 清空历史，保留系统前缀与阈值
    pub fn reset(&mut self) {
        let threshold = self.buffer.token_threshold();
        self.buffer = ConversationBuffer::new(&self.system_contents, threshold);
    }

    /// 将当前历史转写进项目文档
    pub fn upload_messages(&self, doc: &ProjectDoc) -> Result<(), AgentError> {
        doc.append_history(self.buffer.history_messages())?;
        Ok(())
    }

    pub fn buffer(&self) -> &ConversationBuffer {
        &self.buffer
    }

    pub fn invoker(&self) -> &ToolInvoker {
        &self.invoker
    }
}
