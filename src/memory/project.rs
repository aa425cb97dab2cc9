//! 项目文档：对话转写的落盘目标
//!
//! 按「项目名/部分名.md」组织，历史消息展平为 `role: content` 行后追加写入。
//! 编排器只向其写入，不参与编排逻辑。

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::memory::ChatMessage;

/// 项目文档：项目文件夹下的一个 markdown 转写文件
pub struct ProjectDoc {
    project_name: String,
    part_name: String,
    root: PathBuf,
}

impl ProjectDoc {
    /// 创建或获取项目文档；目录与文件不存在时即刻建立
    pub fn new(root: impl Into<PathBuf>, project_name: &str, part_name: &str) -> std::io::Result<Self> {
        let doc = Self {
            project_name: project_name.to_string(),
            part_name: part_name.to_string(),
            root: root.into(),
        };
        std::fs::create_dir_all(doc.folder_path())?;
        if !doc.doc_path().exists() {
            std::fs::File::create(doc.doc_path())?;
        }
        Ok(doc)
    }

    fn folder_path(&self) -> PathBuf {
        self.root.join(&self.project_name)
    }

    fn doc_path(&self) -> PathBuf {
        self.folder_path().join(format!("{}.md", self.part_name))
    }

    /// 将历史消息展平为 `role: content` 行并追加到文档
    pub fn append_history(&self, history: &[ChatMessage]) -> std::io::Result<()> {
        let lines: Vec<String> = history
            .iter()
            .map(|m| format!("{}: {}", role_label(m), m.content))
            .collect();
        self.append_text(&lines.join("\n"))
    }

    /// 追加一段文本（自带换行）
    pub fn append_text(&self, content: &str) -> std::io::Result<()> {
        if content.trim().is_empty() {
            return Ok(());
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.doc_path())?;
        writeln!(file, "{}", content)?;
        Ok(())
    }

    /// 读取文档全部内容
    pub fn content(&self) -> std::io::Result<String> {
        std::fs::read_to_string(self.doc_path())
    }

    /// 清空文档内容
    pub fn clear(&self) -> std::io::Result<()> {
        std::fs::write(self.doc_path(), "")
    }

    /// 重命名文档文件
    pub fn rename(&mut self, new_name: &str) -> std::io::Result<()> {
        let new_path = self.folder_path().join(format!("{}.md", new_name));
        std::fs::rename(self.doc_path(), &new_path)?;
        self.part_name = new_name.to_string();
        Ok(())
    }

    /// 项目文件夹内全部文件名
    pub fn list_files(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.folder_path())? {
            let entry = entry?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn role_label(msg: &ChatMessage) -> &'static str {
    match msg.role {
        crate::memory::Role::System => "system",
        crate::memory::Role::User => "user",
        crate::memory::Role::Assistant => "assistant",
        crate::memory::Role::Tool => "tool",
    }
}

/// 默认项目数据根目录：data/doc
pub fn default_doc_root() -> PathBuf {
    Path::new("data").join("doc")
}
