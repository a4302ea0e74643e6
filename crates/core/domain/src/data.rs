use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 点位值：封闭的带标签联合，下游持久化需穷举处理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TagValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Array(Vec<TagValue>),
    /// UDT / 结构体成员，按成员名排序。
    Structured(BTreeMap<String, TagValue>),
}

impl TagValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            TagValue::Integer(_) => "integer",
            TagValue::Float(_) => "float",
            TagValue::Boolean(_) => "boolean",
            TagValue::String(_) => "string",
            TagValue::Array(_) => "array",
            TagValue::Structured(_) => "structured",
        }
    }

    /// 序列化为存储用 JSON 文本（`{"type":..,"value":..}`）。
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Integer(v) => write!(f, "{}", v),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Boolean(v) => write!(f, "{}", v),
            TagValue::String(v) => write!(f, "{}", v),
            TagValue::Array(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            TagValue::Structured(members) => {
                write!(f, "{{")?;
                for (index, (name, value)) in members.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// 单次扫描产生的读数，创建后不可变。
///
/// 成功读数必有 `value`；失败读数 `value` 为空且带 `error`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub plc_name: String,
    pub tag_name: String,
    pub value: Option<TagValue>,
    pub ts_ms: i64,
    pub success: bool,
    pub error: Option<String>,
}

impl Reading {
    pub fn ok(
        plc_name: impl Into<String>,
        tag_name: impl Into<String>,
        value: TagValue,
        ts_ms: i64,
    ) -> Self {
        Self {
            plc_name: plc_name.into(),
            tag_name: tag_name.into(),
            value: Some(value),
            ts_ms,
            success: true,
            error: None,
        }
    }

    pub fn failed(
        plc_name: impl Into<String>,
        tag_name: impl Into<String>,
        reason: impl Into<String>,
        ts_ms: i64,
    ) -> Self {
        Self {
            plc_name: plc_name.into(),
            tag_name: tag_name.into(),
            value: None,
            ts_ms,
            success: false,
            error: Some(reason.into()),
        }
    }

    /// 实时视图主键 `(plc_name, tag_name)`。
    pub fn key(&self) -> (&str, &str) {
        (&self.plc_name, &self.tag_name)
    }
}

/// 当前 Unix 时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_value_json_is_tagged() {
        let value = TagValue::Float(1.5);
        assert_eq!(value.to_json().unwrap(), r#"{"type":"float","value":1.5}"#);

        let mut members = BTreeMap::new();
        members.insert("speed".to_string(), TagValue::Integer(1200));
        members.insert("running".to_string(), TagValue::Boolean(true));
        let udt = TagValue::Structured(members);
        let parsed = TagValue::from_json(&udt.to_json().unwrap()).unwrap();
        assert_eq!(parsed, udt);
    }

    #[test]
    fn tag_value_display_nests() {
        let value = TagValue::Array(vec![TagValue::Integer(1), TagValue::String("a".into())]);
        assert_eq!(value.to_string(), "[1, a]");
    }

    #[test]
    fn failed_reading_has_no_value() {
        let reading = Reading::failed("Line1", "B", "tag not found", 10);
        assert!(!reading.success);
        assert!(reading.value.is_none());
        assert_eq!(reading.error.as_deref(), Some("tag not found"));
        assert_eq!(reading.key(), ("Line1", "B"));
    }
}
