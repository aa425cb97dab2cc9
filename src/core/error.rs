//! Agent 错误类型
//!
//! AuthRateLimit 是唯一被本地恢复的瞬时失败（退避重试 / 人工引导）；
//! 其余错误一律向上传播。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 认证或限流错误：补全网关的可恢复瞬时失败信号
    #[error("认证或限流错误: {0}")]
    AuthRateLimit(String),

    /// 网关其他失败：不做特殊处理，直接传播
    #[error("LLM 请求失败: {0}")]
    Gateway(String),

    /// 手动移除历史消息时的越界索引：调用方契约错误
    #[error("无效的消息索引: {0}")]
    InvalidIndex(i64),

    #[error("配置错误: {0}")]
    Config(String),

    /// 项目转写写入失败
    #[error("项目文档操作失败: {0}")]
    Project(#[from] std::io::Error),
}
