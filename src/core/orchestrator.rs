//! 对话轮次编排：REQUEST -> CLASSIFY -> DISPATCH -> TEXT_PATH / CODE_PATH
//!
//! 以显式循环驱动状态机（累积缓冲区 + 标志位 + 排队中的 debug 提示），
//! 等价于逐决策点递归的语义，但不随 debug / 修改链增长调用栈。
//! 挂起点只有三处：网关网络往返、瞬时失败的固定退避、阻塞式人工输入。

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;

use crate::core::prompt::{self, PromptAction};
use crate::core::AgentError;
use crate::llm::CompletionGateway;
use crate::memory::{ChatMessage, ConversationBuffer};
use crate::tools::{ToolInvoker, ERROR_MARKER};
use crate::ui::Interaction;

/// 瞬时失败的默认退避时长（秒）
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 60;

/// 专家模式下确认执行流程后追加的用户指令
const PROCEED_PROMPT: &str = "非常好，请按照该流程逐步执行。";

/// 高效 debug：单条提示
const EFFICIENT_DEBUG_PROMPTS: [&str; 1] = ["你编写的代码报错了，请根据报错信息修改代码并重新执行。"];

/// 深度 debug：诊断 -> 提出修复思路 -> 实现并运行
const DEEP_DEBUG_PROMPTS: [&str; 3] = [
    "之前执行的代码报错了，你觉得代码哪里编写错了？",
    "好的。那么根据你的分析，为了解决这个错误，从理论上来说，应该如何操作呢？",
    "非常好，接下来请按照你的逻辑编写相应代码并运行。",
];

/// 一次分派的去向：继续下一轮请求，或终结当前轮次
enum Step {
    Continue,
    Terminal,
}

/// 瞬时失败恢复的结果：重试本次请求，或人工退出
enum RecoveryOutcome {
    Retry,
    Exit,
}

/// 单轮内随循环演进的标志位
struct TurnFlags {
    expert: bool,
    task_decomposition: bool,
    /// 一次性：响应落定后、分派前从历史尾部弹出的条数
    delete_some: usize,
    /// 排队中的 debug 提示；只在子轮次终结时投放下一条，
    /// 中途的续写（工具结果解读、重问、修改链）不会推进队列
    pending_prompts: VecDeque<String>,
}

/// 对话轮次会话：把网关、工具调用器、交互边界与模式开关捆在一起
pub struct ChatSession<'a> {
    model: String,
    gateway: &'a dyn CompletionGateway,
    invoker: &'a ToolInvoker,
    console: &'a dyn Interaction,
    developer_mode: bool,
    expert_mode: bool,
    retry_backoff: Duration,
}

impl<'a> ChatSession<'a> {
    pub fn new(
        model: impl Into<String>,
        gateway: &'a dyn CompletionGateway,
        invoker: &'a ToolInvoker,
        console: &'a dyn Interaction,
    ) -> Self {
        Self {
            model: model.into(),
            gateway,
            invoker,
            console,
            developer_mode: false,
            expert_mode: false,
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
        }
    }

    /// 开发者模式：展示中间产物并在决策点征询人工意见
    pub fn with_developer_mode(mut self, enabled: bool) -> Self {
        self.developer_mode = enabled;
        self
    }

    /// 专家模式：先经任务拆解判定，再决定直答或分步执行
    pub fn with_expert_mode(mut self, enabled: bool) -> Self {
        self.expert_mode = enabled;
        self
    }

    /// 瞬时失败的退避时长（测试用毫秒级）
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// 执行一个逻辑轮次：取走缓冲区，返回终结后的缓冲区。
    /// 人工退出时缓冲区保持原样返回；唯一向上传播的终止是开发者选择报错退出。
    pub async fn run_turn(
        &self,
        mut buffer: ConversationBuffer,
    ) -> Result<ConversationBuffer, AgentError> {
        let mut flags = TurnFlags {
            expert: self.expert_mode,
            task_decomposition: false,
            delete_some: 0,
            pending_prompts: VecDeque::new(),
        };

        loop {
            // REQUEST + CLASSIFY
            let response = match self.settle_response(&mut buffer, &mut flags).await? {
                Some(msg) => msg,
                None => return Ok(buffer),
            };

            // delete_some：一次性消费（丢弃被否决的回答 / 调用对）
            let delete_some = std::mem::take(&mut flags.delete_some);
            for _ in 0..delete_some {
                buffer.manual_pop(-1)?;
            }

            // DISPATCH
            let step = if response.has_tool_calls() {
                self.code_path(&mut buffer, &mut flags, &response).await?
            } else {
                self.text_path(&mut buffer, &mut flags, &response)?
            };

            match step {
                Step::Continue => continue,
                Step::Terminal => {
                    // debug 子对话未走完：子轮次终结才投放下一条提示
                    match flags.pending_prompts.pop_front() {
                        Some(next) => self.inject_debug_prompt(&mut buffer, next),
                        None => return Ok(buffer),
                    }
                }
            }
        }
    }

    fn inject_debug_prompt(&self, buffer: &mut ConversationBuffer, prompt: String) {
        self.console.show("**From Debug iQuery Agent:**");
        self.console.show(&prompt);
        buffer.append(ChatMessage::user(prompt));
    }

    /// REQUEST 与 CLASSIFY：取得本轮落定的响应消息。
    /// 专家模式下若首个响应携带工具调用，则强制对任务拆解派生缓冲区重问一次。
    async fn settle_response(
        &self,
        buffer: &mut ConversationBuffer,
        flags: &mut TurnFlags,
    ) -> Result<Option<ChatMessage>, AgentError> {
        if !flags.task_decomposition {
            let response = match self.request(buffer, flags.expert, flags.expert).await? {
                Some(msg) => msg,
                None => return Ok(None),
            };
            if !(flags.expert && response.has_tool_calls()) {
                return Ok(Some(response));
            }
            flags.task_decomposition = true;
        }

        let response = match self.request(buffer, flags.expert, true).await? {
            Some(msg) => msg,
            None => return Ok(None),
        };
        if response.has_tool_calls() {
            self.console.show("当前任务无需拆解，可以直接运行。");
            tracing::info!("任务拆解判定：无需拆解，保留工具调用");
        }
        Ok(Some(response))
    }

    /// REQUEST 状态：开发者模式对称增删提示后缀；derive 时对派生缓冲区发起请求；
    /// 认证/限流失败按模式分支恢复，其余失败直接传播。
    async fn request(
        &self,
        buffer: &mut ConversationBuffer,
        expert: bool,
        derive: bool,
    ) -> Result<Option<ChatMessage>, AgentError> {
        if self.developer_mode {
            prompt::modify_prompt(buffer, PromptAction::Add, true, true);
        }

        let result = self.request_with_recovery(buffer, expert, derive).await;

        // 无论走了哪个分支，增饰过的后缀都要还原
        if self.developer_mode {
            prompt::modify_prompt(buffer, PromptAction::Remove, true, true);
        }
        result
    }

    async fn request_with_recovery(
        &self,
        buffer: &mut ConversationBuffer,
        expert: bool,
        derive: bool,
    ) -> Result<Option<ChatMessage>, AgentError> {
        let toolset = self.invoker.toolset_schema();
        let mut model = self.model.clone();

        loop {
            // 重新提问后派生缓冲区需要重建，故在循环内派生
            let messages = if derive {
                prompt::task_decomposition_buffer(buffer)?.messages()
            } else {
                buffer.messages()
            };

            match self
                .gateway
                .complete(&model, &messages, toolset.as_ref())
                .await
            {
                Ok(msg) => return Ok(Some(msg)),
                Err(AgentError::AuthRateLimit(reason)) => {
                    if expert {
                        match self.guided_recovery(buffer, &model, &reason).await? {
                            RecoveryOutcome::Retry => continue,
                            RecoveryOutcome::Exit => return Ok(None),
                        }
                    } else if self.developer_mode {
                        self.console
                            .show(&format!("当前遇到了一个链接问题: {}", reason));
                        let choice = self
                            .console
                            .ask("请选择等待重试（1），或者更换模型（2），或者报错退出（3）：");
                        match choice.as_str() {
                            "1" => {
                                self.console.show("好的，将等待后继续运行...");
                                self.backoff().await;
                                self.console.show("等待结束，即将开始新的一轮问答...");
                            }
                            "2" => {
                                model = self.console.ask("好的，请输入新模型名称：");
                                tracing::info!(model = %model, "瞬时失败恢复：切换模型重试");
                            }
                            _ => return Err(AgentError::AuthRateLimit(reason)),
                        }
                    } else {
                        self.console
                            .show(&format!("当前遇到了一个链接问题: {}", reason));
                        self.console.show("由于Limit Rate限制，即将等待后重试...");
                        self.backoff().await;
                        self.console.show("等待结束，即将重新调用模型进行回答...");
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 专家模式下的瞬时失败恢复：旁路补全一段引导语，请用户重新提问或退出
    async fn guided_recovery(
        &self,
        buffer: &mut ConversationBuffer,
        model: &str,
        reason: &str,
    ) -> Result<RecoveryOutcome, AgentError> {
        let mut side = buffer.copy();
        let question = side
            .last_history()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let guide_prompt = format!(
            "以下是用户提问：{}。该问题有些复杂，且用户意图并不清晰。请编写一段话，来引导用户重新提问。",
            question
        );
        match side.last_history_mut() {
            Some(last) => last.content = guide_prompt,
            None => side.append(ChatMessage::user(guide_prompt)),
        }

        match self.gateway.complete(model, &side.messages(), None).await {
            Ok(guide) => {
                self.console.show(&guide.content);
                let input = self
                    .console
                    .ask("请重新输入问题，输入「退出」可以退出当前对话：");
                if input == "退出" {
                    self.console.show("当前模型无法返回结果，已经退出");
                    Ok(RecoveryOutcome::Exit)
                } else {
                    if let Some(last) = buffer.last_history_mut() {
                        last.content = input;
                    }
                    Ok(RecoveryOutcome::Retry)
                }
            }
            Err(AgentError::AuthRateLimit(_)) => {
                self.console
                    .show(&format!("当前遇到了一个链接问题: {}", reason));
                self.console.show("由于Limit Rate限制，即将等待后重试...");
                self.backoff().await;
                self.console.show("等待结束，即将重新调用模型进行回答...");
                Ok(RecoveryOutcome::Retry)
            }
            Err(e) => Err(e),
        }
    }

    /// TEXT_PATH：按开发者 / 专家（含任务拆解）决策表处理文本回答
    fn text_path(
        &self,
        buffer: &mut ConversationBuffer,
        flags: &mut TurnFlags,
        answer: &ChatMessage,
    ) -> Result<Step, AgentError> {
        self.console.show("模型回答：");
        self.console.show(&answer.content);

        let expert_like = flags.expert || flags.task_decomposition;

        if expert_like {
            let choice = self.console.ask(
                "请问是否按照该流程执行任务（1），或者对当前执行流程提出修改意见（2），或者重新进行提问（3），或者直接退出对话（4）：",
            );
            match choice.as_str() {
                "1" => {
                    buffer.append(answer.clone());
                    self.console.show("好的，即将逐步执行上述流程");
                    buffer.append(ChatMessage::user(PROCEED_PROMPT));
                    flags.expert = false;
                    flags.task_decomposition = false;
                    Ok(Step::Continue)
                }
                "2" => self.revise(buffer, flags, answer),
                "3" => self.rephrase(buffer),
                _ => self.exit_turn(),
            }
        } else if self.developer_mode {
            let choice = self.console.ask(
                "请问是否记录回答结果（1），或者对当前结果提出修改意见（2），或者重新进行提问（3），或者直接退出对话（4）：",
            );
            match choice.as_str() {
                "1" => {
                    buffer.append(answer.clone());
                    self.console.show("本次对话结果已保存");
                    Ok(Step::Terminal)
                }
                "2" => self.revise(buffer, flags, answer),
                "3" => self.rephrase(buffer),
                _ => self.exit_turn(),
            }
        } else {
            // 无提示：自动落账并终结本轮
            buffer.append(answer.clone());
            Ok(Step::Terminal)
        }
    }

    /// revise：落账被否决的回答与修改意见，下一次响应落定后弹掉这一对
    fn revise(
        &self,
        buffer: &mut ConversationBuffer,
        flags: &mut TurnFlags,
        answer: &ChatMessage,
    ) -> Result<Step, AgentError> {
        let instruction = self.console.ask("好的，请输入对模型结果的修改意见：");
        self.console.show("好的，正在进行修改。");
        buffer.append(answer.clone());
        buffer.append(ChatMessage::user(instruction));
        flags.delete_some = 2;
        Ok(Step::Continue)
    }

    /// rephrase：原位替换末尾问题内容后重新请求，模式标志不变
    fn rephrase(&self, buffer: &mut ConversationBuffer) -> Result<Step, AgentError> {
        let new_question = self.console.ask("好的，请重新提出问题：");
        if let Some(last) = buffer.last_history_mut() {
            last.content = new_question;
        }
        Ok(Step::Continue)
    }

    fn exit_turn(&self) -> Result<Step, AgentError> {
        self.console.show("好的，已退出当前对话");
        Ok(Step::Terminal)
    }

    /// CODE_PATH：解析参数、渲染操作、可选人工改写、执行工具、哨兵检查
    async fn code_path(
        &self,
        buffer: &mut ConversationBuffer,
        flags: &mut TurnFlags,
        call_message: &ChatMessage,
    ) -> Result<Step, AgentError> {
        let call = &call_message.tool_calls[0];

        // 参数 JSON 解析失败视为一次生成毛刺：不动缓冲区，静默重问
        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(v) => v,
            Err(e) => {
                self.console.show("json字符解析错误，正在重新创建代码...");
                tracing::warn!(error = %e, "工具调用参数解析失败，重新请求补全");
                return Ok(Step::Continue);
            }
        };

        // 人工可见：按参数形状推断语言的代码块
        self.console.show(&render_operation(&args));

        if self.developer_mode {
            let choice = self
                .console
                .ask("是直接运行代码（1），还是反馈修改意见，并让模型对代码进行修改后再运行（2）：");
            if choice != "1" {
                let instruction = self.console.ask("好的，请输入修改意见：");
                buffer.append(call_message.clone());
                buffer.append(ChatMessage::user(instruction));
                flags.delete_some = 2;
                return Ok(Step::Continue);
            }
        }

        let result_message = self.invoker.invoke(call, args).await;

        if result_message.content.contains(ERROR_MARKER) {
            self.console.show(&result_message.content);
            self.enter_debug(buffer, flags, call_message, result_message);
            return Ok(Step::Continue);
        }

        self.console.show("外部函数已执行完毕，正在解析运行结果...");
        buffer.append(call_message.clone());
        buffer.append(result_message);
        Ok(Step::Continue)
    }

    /// 进入 debug 子对话：副本 + 调用与结果取代原缓冲区（原有续写被丢弃），
    /// debug 提示插到队首，子步骤一律关闭专家模式
    fn enter_debug(
        &self,
        buffer: &mut ConversationBuffer,
        flags: &mut TurnFlags,
        call_message: &ChatMessage,
        result_message: ChatMessage,
    ) {
        let prompts: &[&str] = if flags.expert {
            self.console.show(
                "**即将执行深度debug，该debug过程将自动执行多轮对话，请耐心等待。正在实例化Deep Debug Agent...**",
            );
            &DEEP_DEBUG_PROMPTS
        } else {
            self.console
                .show("**即将执行高效debug，正在实例化Efficient Debug Agent...**");
            &EFFICIENT_DEBUG_PROMPTS
        };

        let mut debug_buffer = buffer.copy();
        debug_buffer.append(call_message.clone());
        debug_buffer.append(result_message);
        *buffer = debug_buffer;

        for p in prompts.iter().rev() {
            flags.pending_prompts.push_front(p.to_string());
        }
        // 首条提示立刻进入缓冲区，其余在各子轮次终结时投放
        if let Some(first) = flags.pending_prompts.pop_front() {
            self.inject_debug_prompt(buffer, first);
        }
        flags.expert = false;
        flags.task_decomposition = false;
    }

    async fn backoff(&self) {
        tokio::time::sleep(self.retry_backoff).await;
    }
}

/// 把工具调用参数渲染为人工可读的代码块：
/// sql_query -> ```sql，py_code -> ```python，其余原样输出 JSON
fn render_operation(args: &Value) -> String {
    if let Some(sql) = args.get("sql_query").and_then(|v| v.as_str()) {
        format!("```sql\n{}\n```", sql)
    } else if let Some(code) = args.get("py_code").and_then(|v| v.as_str()) {
        format!("```python\n{}\n```", code)
    } else {
        args.to_string()
    }
}
