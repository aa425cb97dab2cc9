//! 工具执行上下文
//!
//! 会话级的显式可变命名空间：工具在槽位中读写共享数据（如提取出的数据表），
//! 取代对进程级全局状态的隐式访问。每个工具声明自己读写哪些槽位。

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// 工具声明的槽位访问：读哪些、写哪些
#[derive(Clone, Debug, Default)]
pub struct SlotAccess {
    pub reads: Vec<String>,
    pub writes: Vec<String>,
}

impl SlotAccess {
    pub fn writes(slots: &[&str]) -> Self {
        Self {
            reads: Vec::new(),
            writes: slots.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn reads(slots: &[&str]) -> Self {
        Self {
            reads: slots.iter().map(|s| s.to_string()).collect(),
            writes: Vec::new(),
        }
    }
}

/// 会话级执行上下文：槽位名 -> JSON 值
#[derive(Default)]
pub struct ExecutionContext {
    slots: Mutex<HashMap<String, Value>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: &str) -> Option<Value> {
        self.slots.lock().expect("context lock").get(slot).cloned()
    }

    pub fn set(&self, slot: &str, value: Value) {
        self.slots
            .lock()
            .expect("context lock")
            .insert(slot.to_string(), value);
    }

    pub fn remove(&self, slot: &str) -> Option<Value> {
        self.slots.lock().expect("context lock").remove(slot)
    }

    pub fn slot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .lock()
            .expect("context lock")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
