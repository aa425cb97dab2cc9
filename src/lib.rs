//! iQuery - 对话式数据分析 Agent
//!
//! 围绕一个带 token 预算的对话缓冲区运转：每个逻辑轮次由显式状态机驱动
//! （请求补全 → 任务拆解判定 → 文本 / 代码分派 → 人工决策点 → debug 子对话），
//! 工具调用经注册表分发，失败转写为带标记的结果文本触发自动 debug。
//!
//! 模块划分：
//! - memory: 消息类型、对话缓冲区、token 估算、项目文档
//! - llm: 补全网关抽象与 OpenAI 实现、脚本化测试网关
//! - tools: 工具注册表、执行上下文、调用器与 SQL 工具
//! - core: 错误类型、提示词增强、轮次编排状态机
//! - ui: 阻塞式人机交互边界
//! - agent: 组装各层的门面

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod tools;
pub mod ui;
