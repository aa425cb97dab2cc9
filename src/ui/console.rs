//! 人机交互边界
//!
//! 每个决策点都是阻塞式文本提示：先展示促成决策的材料（工具调用渲染、
//! 模型回答、引导语），再等待输入。生产实现走标准输入输出，
//! 测试用脚本化实现（预置回复 + 捕获输出）。

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

/// 交互 trait：展示文本与阻塞式提问
pub trait Interaction: Send + Sync {
    /// 向用户展示一段文本
    fn show(&self, text: &str);

    /// 阻塞式提问，返回用户输入（已去除首尾空白）
    fn ask(&self, prompt: &str) -> String;
}

/// 标准输入输出实现
#[derive(Default)]
pub struct StdioConsole;

impl Interaction for StdioConsole {
    fn show(&self, text: &str) {
        println!("{}", text);
    }

    fn ask(&self, prompt: &str) -> String {
        print!("{}", prompt);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return String::new();
        }
        line.trim().to_string()
    }
}

/// 脚本化实现：按顺序弹出预置回复，记录全部展示与提问内容
#[derive(Default)]
pub struct ScriptedConsole {
    replies: Mutex<VecDeque<String>>,
    transcript: Mutex<Vec<String>>,
}

impl ScriptedConsole {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            transcript: Mutex::new(Vec::new()),
        }
    }

    /// 已展示 / 提问过的全部文本
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.lock().expect("transcript lock").clone()
    }
}

impl Interaction for ScriptedConsole {
    fn show(&self, text: &str) {
        self.transcript
            .lock()
            .expect("transcript lock")
            .push(text.to_string());
    }

    fn ask(&self, prompt: &str) -> String {
        self.transcript
            .lock()
            .expect("transcript lock")
            .push(prompt.to_string());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_default()
    }
}
