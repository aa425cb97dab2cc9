//! 提示词修饰与任务拆解增强
//!
//! modify_prompt：在一次补全请求前后，对历史中最后一条消息对称地增删
//! 固定后缀（思维链 / markdown 输出）；add 过的内容必须 remove 干净。
//! task_decomposition_buffer：构造派生缓冲区（few-shot 示例 + 改写后的问题），
//! 迫使模型先判断问题是否需要分步执行，绝不改动调用方的缓冲区。

use crate::core::AgentError;
use crate::memory::{ChatMessage, ConversationBuffer, Role};

/// 思维链后缀
pub const COT_PROMPT: &str = "请一步步思考并得出结论。";
/// markdown 输出后缀
pub const MD_PROMPT: &str = "任何回答都请以markdown格式进行输出。";

/// 增删动作
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptAction {
    Add,
    Remove,
}

/// 对历史最后一条消息的内容增删固定后缀。
/// 两个开关彼此独立；remove 与 add 的后缀顺序互为镜像，保证对称还原。
pub fn modify_prompt(
    buffer: &mut ConversationBuffer,
    action: PromptAction,
    enable_md: bool,
    enable_cot: bool,
) {
    let Some(last) = buffer.last_history_mut() else {
        return;
    };

    match action {
        PromptAction::Add => {
            if enable_cot {
                last.content.push_str(COT_PROMPT);
            }
            if enable_md {
                last.content.push_str(MD_PROMPT);
            }
        }
        PromptAction::Remove => {
            if enable_md {
                last.content = last.content.replace(MD_PROMPT, "");
            }
            if enable_cot {
                last.content = last.content.replace(COT_PROMPT, "");
            }
        }
    }
}

/// 把用户问题改写为任务拆解模板
pub fn rewrite_question(question: &str) -> String {
    format!(
        "现有用户问题如下：{}。为了回答这个问题，总共需要分几步来执行呢？若无需拆分执行步骤，请直接回答原始问题。",
        question
    )
}

/// 四组固定的 few-shot 示例：演示「这个问题需要分几步」的回答格式
fn few_shot_examples() -> Vec<ChatMessage> {
    let pairs = [
        (
            "请什么是机器学习？",
            "机器学习是一种人工智能（AI）的形式，它让计算机能够从数据中学习规律，而无需显式编程。该问题无需拆分步骤，可以直接回答。",
        ),
        (
            "请帮我介绍下OpenAI。",
            "OpenAI是一家开发和应用友好人工智能的公司，其使命是确保通用人工智能造福全人类。该问题无需拆分步骤，可以直接回答。",
        ),
        (
            "围绕数据库中的user_payments表，我想要检查该表是否存在缺失值",
            "为了检查user_payments数据集是否存在缺失值，总共需要分三步执行：第一步提取数据表，第二步统计各字段缺失值数量，第三步汇总并输出结论。",
        ),
        (
            "我想寻找合适的缺失值填补方法，来填补user_payments数据集中的缺失值。",
            "为了找到合适的缺失值填充方法，总共需要分四步执行：第一步分析缺失字段的分布，第二步对比均值、中位数与模型填补方案，第三步实施填补，第四步验证填补后的数据质量。",
        ),
    ];

    let mut examples = Vec::with_capacity(pairs.len() * 2);
    for (question, answer) in pairs {
        examples.push(ChatMessage::user(rewrite_question(question)));
        examples.push(ChatMessage::assistant(answer));
    }
    examples
}

/// 构造任务拆解派生缓冲区：
/// 复制 → 摘除末尾问题 → 追加 few-shot 示例 → 以模板改写后重新追加原问题。
pub fn task_decomposition_buffer(
    buffer: &ConversationBuffer,
) -> Result<ConversationBuffer, AgentError> {
    let mut derived = buffer.copy();
    let question_message = derived.manual_pop(-1)?;

    for example in few_shot_examples() {
        derived.append(example);
    }

    let mut rewritten = question_message;
    rewritten.content = rewrite_question(&rewritten.content);
    derived.append(rewritten);

    Ok(derived)
}

/// 派生缓冲区末尾的问题是否已经是拆解模板（CLASSIFY 重问时避免嵌套改写）
pub fn is_decomposition_question(msg: &ChatMessage) -> bool {
    msg.role == Role::User && msg.content.starts_with("现有用户问题如下：")
}
