//! Structured values and the key-walking accessor exposed to templates.
//!
//! [`Value::resolve`] walks a value by successive string keys:
//!
//! | Variant  | Step                                                     |
//! |----------|----------------------------------------------------------|
//! | `Map`    | key is a map key                                         |
//! | `Ref`    | dereferenced without consuming a key                     |
//! | `Tuple`  | key is consumed, the walk stays on the tuple             |
//! | `Seq`    | key is parsed as a base-10 index                         |
//! | `Record` | key is a field name                                      |
//! | scalars  | walk fails                                               |
//!
//! Any failing step makes the whole walk return `None`; callers render that
//! as empty output.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Tagged structured value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Indexable sequence.
    Seq(Vec<Value>),
    /// Fixed-size tuple. Not indexable by the accessor.
    Tuple(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Record(Record),
    /// Shared indirection, transparent to the accessor.
    Ref(Arc<Value>),
}

/// Named collection of fields, accessed by field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: &'static str,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Builder-style field append.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

impl Value {
    /// Walk `self` by `keys`, left to right. See the module docs.
    pub fn resolve<K: AsRef<str>>(&self, keys: &[K]) -> Option<&Value> {
        let mut current = self;
        for key in keys {
            let key = key.as_ref();
            current = current.deref_all();
            current = match current {
                Value::Map(map) => map.get(key)?,
                Value::Tuple(_) => continue,
                Value::Seq(items) => items.get(key.parse::<usize>().ok()?)?,
                Value::Record(record) => record.get(key)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Follow `Ref` indirections to the first non-reference value.
    pub fn deref_all(&self) -> &Value {
        let mut current = self;
        while let Value::Ref(inner) = current {
            current = inner;
        }
        current
    }

    pub fn is_null(&self) -> bool {
        matches!(self.deref_all(), Value::Null)
    }

    /// Convert into the JSON model used by the template engine.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::Seq(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Record(record) => Json::Object(
                record
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Ref(inner) => inner.to_json(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Seq(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        Value::from(json.clone())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Seq(items) | Value::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Record(record) => {
                let mut out = serializer.serialize_map(Some(record.fields.len()))?;
                for (k, v) in &record.fields {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Ref(inner) => inner.serialize(serializer),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
