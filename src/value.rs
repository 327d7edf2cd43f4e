use serde::{Deserialize, Serialize};

/// A value carried on the bus. `Null` is a distinguishable value in its own
/// right (the "no value yet" sentinel), not an absence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "val", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Dynamic(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// A single update delivered by the bus for a subscribed path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    pub path: String,
    pub value: Value,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl SubscriptionUpdate {
    pub fn new(path: impl Into<String>, value: Value, timestamp: i64) -> Self {
        Self {
            path: path.into(),
            value,
            timestamp,
            meta: None,
        }
    }
}

/// The POINT_CHANGE predicate: either exactly one of `prev`/`curr` is null,
/// or neither is null and they are structurally unequal.
pub fn changed(prev: &Value, curr: &Value) -> bool {
    match (prev.is_null(), curr.is_null()) {
        (true, true) => false,
        (true, false) | (false, true) => true,
        (false, false) => prev != curr,
    }
}

pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}
