//! 对话缓冲区
//!
//! 固定的系统前缀 + 可变的历史消息，带 token 预算：每次追加后自动剪除，
//! 直至总 token 低于阈值或历史为空。剪除从**尾部**（最新一条）开始，
//! 调用方依赖它来丢弃刚被否决的回答。

use std::sync::Arc;

use crate::core::AgentError;
use crate::memory::estimator::TokenEstimator;
use crate::memory::ChatMessage;

/// 消息计量函数：输入一条消息，输出其 token 估算值
pub type TokenCounter = Arc<dyn Fn(&ChatMessage) -> usize + Send + Sync>;

fn default_counter() -> TokenCounter {
    Arc::new(|msg: &ChatMessage| TokenEstimator::estimate(&msg.rendered()))
}

/// 对话缓冲区：system_messages ++ history_messages，token 计数增量维护
#[derive(Clone)]
pub struct ConversationBuffer {
    system_messages: Vec<ChatMessage>,
    history_messages: Vec<ChatMessage>,
    token_count: usize,
    token_threshold: Option<usize>,
    counter: TokenCounter,
}

impl ConversationBuffer {
    /// 以系统消息内容列表与可选 token 阈值构造。
    /// 若系统前缀本身已超出阈值，则整个前缀不会被输入模型。
    pub fn new(system_contents: &[String], token_threshold: Option<usize>) -> Self {
        Self::with_counter(system_contents, token_threshold, default_counter())
    }

    /// 指定计量函数构造（测试用固定计量，生产用默认估算器）
    pub fn with_counter(
        system_contents: &[String],
        token_threshold: Option<usize>,
        counter: TokenCounter,
    ) -> Self {
        let mut buffer = Self {
            system_messages: Vec::new(),
            history_messages: Vec::new(),
            token_count: 0,
            token_threshold,
            counter,
        };

        let mut system_tokens = 0;
        for content in system_contents {
            let msg = ChatMessage::system(content.clone());
            system_tokens += (buffer.counter)(&msg);
            buffer.system_messages.push(msg);
        }

        if let Some(thr) = token_threshold {
            if !buffer.system_messages.is_empty() && system_tokens >= thr {
                tracing::warn!("系统消息 token 数量超出阈值，当前系统前缀将不会被输入模型");
                buffer.system_messages.clear();
                system_tokens = 0;
            }
        }
        buffer.token_count = system_tokens;

        buffer
    }

    /// 全部消息：系统前缀 ++ 历史（每次调用重新拼接，保证分区不变式）
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut all = self.system_messages.clone();
        all.extend(self.history_messages.iter().cloned());
        all
    }

    pub fn system_messages(&self) -> &[ChatMessage] {
        &self.system_messages
    }

    pub fn history_messages(&self) -> &[ChatMessage] {
        &self.history_messages
    }

    pub fn num_system_messages(&self) -> usize {
        self.system_messages.len()
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn token_threshold(&self) -> Option<usize> {
        self.token_threshold
    }

    /// 历史中最后一条消息（提示词增删与重新提问的目标）
    pub fn last_history(&self) -> Option<&ChatMessage> {
        self.history_messages.last()
    }

    pub fn last_history_mut(&mut self) -> Option<&mut ChatMessage> {
        self.history_messages.last_mut()
    }

    /// 追加一条消息：计入 token 后自动剪除
    pub fn append(&mut self, msg: ChatMessage) {
        self.token_count += (self.counter)(&msg);
        self.history_messages.push(msg);
        self.evict_to_threshold();
    }

    /// 追加另一个缓冲区的历史：token 计数按对方的总计数整体并入
    /// （对方含系统消息时为高估，阈值控制只需要估计值）
    pub fn append_buffer(&mut self, other: &ConversationBuffer) {
        self.history_messages
            .extend(other.history_messages.iter().cloned());
        self.token_count += other.token_count;
        self.evict_to_threshold();
    }

    /// 阈值剪除：总数 >= 阈值且历史非空时，反复移除历史**尾部**一条
    pub fn evict_to_threshold(&mut self) {
        if let Some(thr) = self.token_threshold {
            while self.token_count >= thr && !self.history_messages.is_empty() {
                self.drop_at(self.history_messages.len() - 1);
            }
        }
    }

    /// 手动移除指定历史元素：-1 表示最后一条，否则须在 0..len 内；
    /// 越界是调用方的契约错误，立即报错而不重试
    pub fn manual_pop(&mut self, index: i64) -> Result<ChatMessage, AgentError> {
        self.evict_to_threshold();

        let len = self.history_messages.len();
        let idx = if index == -1 {
            len.checked_sub(1).ok_or(AgentError::InvalidIndex(index))?
        } else if index >= 0 && (index as usize) < len {
            index as usize
        } else {
            return Err(AgentError::InvalidIndex(index));
        };

        Ok(self.drop_at(idx))
    }

    /// 复制出一个独立缓冲区：相同系统前缀、相同阈值、历史深拷贝
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// 追加系统消息并重新计入 token
    pub fn add_system_messages(&mut self, contents: &[String]) {
        for content in contents {
            let msg = ChatMessage::system(content.clone());
            self.token_count += (self.counter)(&msg);
            self.system_messages.push(msg);
        }
        self.evict_to_threshold();
    }

    /// 删除全部系统消息：清空前缀并扣除其 token 贡献
    pub fn delete_system_messages(&mut self) {
        let removed: usize = self
            .system_messages
            .iter()
            .map(|m| (self.counter)(m))
            .sum();
        self.token_count = self.token_count.saturating_sub(removed);
        self.system_messages.clear();
    }

    /// 逆序剔除历史中所有工具调用与工具结果消息
    pub fn delete_tool_messages(&mut self) {
        for index in (0..self.history_messages.len()).rev() {
            if self.history_messages[index].is_tool_related() {
                self.drop_at(index);
            }
        }
    }

    fn drop_at(&mut self, index: usize) -> ChatMessage {
        let dropped = self.history_messages.remove(index);
        self.token_count = self.token_count.saturating_sub((self.counter)(&dropped));
        dropped
    }
}

impl std::fmt::Debug for ConversationBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationBuffer")
            .field("system_messages", &self.system_messages.len())
            .field("history_messages", &self.history_messages.len())
            .field("token_count", &self.token_count)
            .field("token_threshold", &self.token_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 每条消息固定 10 token 的计量函数
    fn fixed_counter() -> TokenCounter {
        Arc::new(|_: &ChatMessage| 10)
    }

    #[test]
    fn test_eviction_invariant_under_threshold() {
        // 阈值 50，每条 10 token：追加 6 条后历史至多 4 条且计数 < 50
        let mut buf = ConversationBuffer::with_counter(&[], Some(50), fixed_counter());
        for i in 0..6 {
            buf.append(ChatMessage::user(format!("消息{}", i)));
        }
        assert!(buf.token_count() < 50);
        assert!(buf.history_messages().len() <= 4);
    }

    #[test]
    fn test_tail_eviction_keeps_oldest() {
        // 尾部剪除：超限时丢掉最新的一条，最旧的保留
        let mut buf = ConversationBuffer::with_counter(&[], Some(30), fixed_counter());
        buf.append(ChatMessage::user("第一条"));
        buf.append(ChatMessage::user("第二条"));
        buf.append(ChatMessage::user("第三条"));
        assert_eq!(buf.history_messages().len(), 2);
        assert_eq!(buf.history_messages()[0].content, "第一条");
        assert_eq!(buf.history_messages()[1].content, "第二条");
    }

    #[test]
    fn test_copy_is_independent() {
        let mut original = ConversationBuffer::new(&["数据字典".to_string()], None);
        original.append(ChatMessage::user("查询缺失值"));

        let before_tokens = original.token_count();
        let before_messages = original.messages();

        let mut copied = original.copy();
        copied.append(ChatMessage::assistant("好的"));
        copied.last_history_mut().unwrap().content = "改写后的问题".to_string();

        assert_eq!(original.token_count(), before_tokens);
        assert_eq!(original.messages(), before_messages);
        assert_eq!(original.history_messages().len(), 1);
    }

    #[test]
    fn test_append_buffer_token_accounting() {
        let mut a = ConversationBuffer::new(&[], None);
        a.append(ChatMessage::user("问题一"));
        let mut b = ConversationBuffer::new(&[], None);
        b.append(ChatMessage::user("问题二"));
        b.append(ChatMessage::assistant("回答二"));

        let expected = a.token_count() + b.token_count();
        a.append_buffer(&b);
        assert_eq!(a.token_count(), expected);
        assert_eq!(a.history_messages().len(), 3);
    }

    #[test]
    fn test_delete_system_messages() {
        let mut buf = ConversationBuffer::new(&["字典甲".to_string(), "字典乙".to_string()], None);
        buf.append(ChatMessage::user("你好"));
        assert_eq!(buf.num_system_messages(), 2);

        buf.delete_system_messages();
        assert_eq!(buf.num_system_messages(), 0);
        assert_eq!(buf.messages(), buf.history_messages().to_vec());
    }

    #[test]
    fn test_delete_tool_messages() {
        use crate::memory::ToolCall;
        let mut buf = ConversationBuffer::new(&[], None);
        buf.append(ChatMessage::user("查一下"));
        buf.append(ChatMessage::assistant_tool_call(ToolCall {
            id: "c1".into(),
            name: "sql_query".into(),
            arguments: "{}".into(),
        }));
        buf.append(ChatMessage::tool_result("c1", "sql_query", "[]"));
        buf.append(ChatMessage::assistant("查询完成"));

        buf.delete_tool_messages();
        assert_eq!(buf.history_messages().len(), 2);
        assert!(buf.history_messages().iter().all(|m| !m.is_tool_related()));
    }

    #[test]
    fn test_manual_pop_invalid_index() {
        let mut buf = ConversationBuffer::new(&[], None);
        buf.append(ChatMessage::user("你好"));
        assert!(matches!(buf.manual_pop(5), Err(AgentError::InvalidIndex(5))));
        assert!(buf.manual_pop(-1).is_ok());
        assert!(matches!(buf.manual_pop(-1), Err(AgentError::InvalidIndex(-1))));
    }

    #[test]
    fn test_oversized_system_prefix_dropped_at_construction() {
        let huge = "数据字典".repeat(100);
        let buf = ConversationBuffer::with_counter(&[huge], Some(50), Arc::new(|_| 100));
        assert_eq!(buf.num_system_messages(), 0);
        assert_eq!(buf.token_count(), 0);
    }
}
