//! 工具层：注册表、执行上下文、调用器与具体工具（SQL 查询 / 数据提取）

pub mod context;
pub mod invoker;
pub mod registry;
pub mod sql;

pub use context::{ExecutionContext, SlotAccess};
pub use invoker::{ToolInvoker, ERROR_MARKER, TOOL_ERROR_PREFIX};
pub use registry::{Tool, ToolRegistry};
pub use sql::{default_db_path, ExtractDataTool, SqlQueryTool};
