//! 交互层：阻塞式控制台提示（生产 Stdio / 测试脚本化）

pub mod console;

pub use console::{Interaction, ScriptedConsole, StdioConsole};
