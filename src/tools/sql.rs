//! SQL 查询工具
//!
//! sql_query：对本地 SQLite 数据库执行查询，返回 JSON 行集；
//! extract_data：执行查询并把结果表写入执行上下文槽位，供后续工具复用。
//! 这两个工具是注册表背后的具体协作方，编排器不感知其内部逻辑。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

use crate::tools::context::{ExecutionContext, SlotAccess};
use crate::tools::Tool;

/// 默认数据库文件路径：data/db/iquery.db
pub fn default_db_path() -> PathBuf {
    Path::new("data").join("db").join("iquery.db")
}

fn run_query(db_path: &Path, sql: &str) -> Result<(Vec<String>, Vec<Vec<Value>>), String> {
    let conn = Connection::open(db_path).map_err(|e| e.to_string())?;
    let mut stmt = conn.prepare(sql).map_err(|e| e.to_string())?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();

    let mut rows = Vec::new();
    let mut raw = stmt.query([]).map_err(|e| e.to_string())?;
    while let Some(row) = raw.next().map_err(|e| e.to_string())? {
        let mut record = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value = match row.get_ref(i).map_err(|e| e.to_string())? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(n) => Value::from(n),
                ValueRef::Real(f) => Value::from(f),
                ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(b) => Value::from(format!("<blob {} bytes>", b.len())),
            };
            record.push(value);
        }
        rows.push(record);
    }
    Ok((columns, rows))
}

fn sql_from_args(args: &Value) -> Result<String, String> {
    args.get("sql_query")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| "缺少 sql_query 参数".to_string())
}

/// 执行 SQL 查询并返回 JSON 行集
pub struct SqlQueryTool {
    db_path: PathBuf,
}

impl SqlQueryTool {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

#[async_trait]
impl Tool for SqlQueryTool {
    fn name(&self) -> &str {
        "sql_query"
    }

    fn description(&self) -> &str {
        "对iquery数据库执行SQL查询语句，返回JSON格式的查询结果。"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql_query": {
                    "type": "string",
                    "description": "要执行的SQL查询语句"
                }
            },
            "required": ["sql_query"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ExecutionContext) -> Result<String, String> {
        let sql = sql_from_args(&args)?;
        let db_path = self.db_path.clone();
        let (_, rows) = tokio::task::spawn_blocking(move || run_query(&db_path, &sql))
            .await
            .map_err(|e| e.to_string())??;
        serde_json::to_string(&rows).map_err(|e| e.to_string())
    }
}

/// 执行查询并把结果表存入执行上下文槽位（列名 + 行集）
pub struct ExtractDataTool {
    db_path: PathBuf,
}

impl ExtractDataTool {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

#[async_trait]
impl Tool for ExtractDataTool {
    fn name(&self) -> &str {
        "extract_data"
    }

    fn description(&self) -> &str {
        "执行SQL查询并把结果保存为会话中的命名数据表，供后续分析使用。"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql_query": {
                    "type": "string",
                    "description": "要执行的SQL查询语句"
                },
                "df_name": {
                    "type": "string",
                    "description": "保存结果表的变量名"
                }
            },
            "required": ["sql_query", "df_name"]
        })
    }

    fn slot_access(&self) -> SlotAccess {
        SlotAccess::writes(&["df_name 指定的结果表槽位"])
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<String, String> {
        let sql = sql_from_args(&args)?;
        let df_name = args
            .get("df_name")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| "缺少 df_name 参数".to_string())?;

        let db_path = self.db_path.clone();
        let (columns, rows) = tokio::task::spawn_blocking(move || run_query(&db_path, &sql))
            .await
            .map_err(|e| e.to_string())??;

        ctx.set(
            &df_name,
            serde_json::json!({ "columns": columns, "rows": rows }),
        );
        Ok(format!("已成功完成{}变量创建", df_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE user_payments (user_id INTEGER, amount REAL);
             INSERT INTO user_payments VALUES (1, 29.9), (2, 58.0);",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_sql_query_returns_json_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("iquery.db");
        seed_db(&db);

        let tool = SqlQueryTool::new(&db);
        let ctx = ExecutionContext::new();
        let out = tool
            .execute(
                serde_json::json!({"sql_query": "SELECT COUNT(*) FROM user_payments"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(out, "[[2]]");
    }

    #[tokio::test]
    async fn test_extract_data_writes_context_slot() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("iquery.db");
        seed_db(&db);

        let tool = ExtractDataTool::new(&db);
        let ctx = ExecutionContext::new();
        let out = tool
            .execute(
                serde_json::json!({
                    "sql_query": "SELECT user_id, amount FROM user_payments",
                    "df_name": "payments_df"
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(out, "已成功完成payments_df变量创建");

        let table = ctx.get("payments_df").unwrap();
        assert_eq!(table["columns"], serde_json::json!(["user_id", "amount"]));
        assert_eq!(table["rows"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_sql_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("iquery.db");
        seed_db(&db);

        let tool = SqlQueryTool::new(&db);
        let ctx = ExecutionContext::new();
        let err = tool
            .execute(serde_json::json!({"sql_query": "SELECT * FROM missing"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.contains("missing"));
    }
}
