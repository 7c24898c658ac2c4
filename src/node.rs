#![allow(dead_code)]
//! Node, reference and field value types emitted into the node store.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Record identifier, compared loosely: the JSON number `5` and the string
/// `"5"` are the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read an id from a JSON value. Only strings and numbers are ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// Read an id only if the value is representable as an integer
    /// (`12`, `"12"`), the shape of a bare foreign key inside an array.
    pub fn from_integer_like(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| Self((f as i64).to_string())),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .map(|n| Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

macro_rules! record_id_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for RecordId {
            fn from(n: $t) -> Self {
                Self(n.to_string())
            }
        })*
    };
}

record_id_from_int!(i32, i64, u32, u64);

/// Pointer to a node in another collection, resolved lazily by the store.
///
/// `type_name` is `None` when the target id was not in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub type_name: Option<String>,
    pub id: RecordId,
}

impl Reference {
    pub fn new(type_name: Option<String>, id: RecordId) -> Self {
        Self { type_name, id }
    }

    pub fn is_resolved(&self) -> bool {
        self.type_name.is_some()
    }
}

pub type FieldMap = IndexMap<String, FieldValue>;

/// A normalized field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Reference(Reference),
    List(Vec<FieldValue>),
    Map(FieldMap),
    /// Scalars and unwrapped rich text, passed through untouched.
    Raw(Value),
}

impl FieldValue {
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            FieldValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            FieldValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// A normalized record ready for emission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Node {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}
