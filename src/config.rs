//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `IQUERY__*` 覆盖
//! （双下划线表示嵌套，如 `IQUERY__LLM__MODEL=gpt-4-0613`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agent: AgentSection,
}

/// [app] 段：项目文档与数据库的落盘位置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    /// 项目文档根目录，未设置时用 data/doc
    pub doc_root: Option<PathBuf>,
    /// SQLite 数据库文件，未设置时用 data/db/iquery.db
    pub db_path: Option<PathBuf>,
}

/// [llm] 段：模型与接入点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时回退到环境变量 OPENAI_API_KEY
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-4-0613".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

/// [agent] 段：模式开关与退避
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 开发者模式：展示中间产物并在决策点征询人工意见
    pub developer_mode: bool,
    /// 专家模式：先做任务拆解判定，再决定直答或分步执行
    pub expert_mode: bool,
    /// 瞬时失败的退避时长（秒）
    pub retry_backoff_secs: u64,
    /// 缓冲区 token 阈值；未设置时按模型名推断
    pub token_threshold: Option<usize>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            developer_mode: false,
            expert_mode: false,
            retry_backoff_secs: crate::core::DEFAULT_RETRY_BACKOFF_SECS,
            token_threshold: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            agent: AgentSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 IQUERY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 IQUERY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("IQUERY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
