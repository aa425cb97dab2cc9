//! iQuery - 对话式数据分析 Agent
//!
//! 入口：初始化日志与配置，注册 SQL 工具，进入交互式问答循环。

use anyhow::Context;
use iquery::agent::IqueryAgent;
use iquery::config::load_config;
use iquery::llm::OpenAiGateway;
use iquery::tools::{default_db_path, ExtractDataTool, SqlQueryTool, ToolInvoker, ToolRegistry};
use iquery::ui::StdioConsole;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let config = load_config(None).context("配置加载失败")?;

    // 确保数据目录存在
    let db_path = config.app.db_path.clone().unwrap_or_else(default_db_path);
    if let Some(parent) = db_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Some(ref doc_root) = config.app.doc_root {
        let _ = std::fs::create_dir_all(doc_root);
    }

    let gateway = OpenAiGateway::new(
        config.llm.base_url.as_deref(),
        config.llm.api_key.as_deref(),
    );

    let mut registry = ToolRegistry::new();
    registry.register(SqlQueryTool::new(db_path.clone()));
    registry.register(ExtractDataTool::new(db_path));
    let invoker = ToolInvoker::new(registry);

    let mut agent = IqueryAgent::new(
        &config,
        Vec::new(),
        Box::new(gateway),
        invoker,
        Box::new(StdioConsole),
    );

    agent.chat(None).await.context("对话执行失败")?;
    Ok(())
}
