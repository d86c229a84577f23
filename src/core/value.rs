//! Call values
//!
//! Arguments and return values travel through the engine as a tagged union.
//! Objects are carried as handles: a class name, an identity, and a snapshot
//! of the fields selectors are allowed to look at.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::object::ObjectId;

/// A value passed to or returned from a hookable member
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(ObjectHandle),
}

/// Reference to a host object, as seen by conditions and hooks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectHandle {
    /// Concrete class name
    pub class: String,
    /// Instance identity
    pub id: ObjectId,
    /// Fields exposed to selector matching
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl ObjectHandle {
    pub fn new(class: impl Into<String>, id: ObjectId) -> Self {
        Self {
            class: class.into(),
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Add a selector-visible field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Primitive kinds understood by the type classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTag {
    Array,
    Bool,
    Float,
    Int,
    Null,
    Object,
    String,
}

impl PrimitiveTag {
    /// Parse a tag name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "array" => Some(Self::Array),
            "bool" | "boolean" => Some(Self::Bool),
            "float" | "double" => Some(Self::Float),
            "int" | "integer" => Some(Self::Int),
            "null" => Some(Self::Null),
            "object" => Some(Self::Object),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

impl Value {
    pub fn tag(&self) -> PrimitiveTag {
        match self {
            Value::Null => PrimitiveTag::Null,
            Value::Bool(_) => PrimitiveTag::Bool,
            Value::Int(_) => PrimitiveTag::Int,
            Value::Float(_) => PrimitiveTag::Float,
            Value::Str(_) => PrimitiveTag::String,
            Value::Array(_) => PrimitiveTag::Array,
            Value::Object(_) => PrimitiveTag::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null and `false` are the only values that decline a path hook
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(handle) => Some(handle),
            _ => None,
        }
    }

    /// Parse a literal written inside a method spec
    ///
    /// `null`, `true`, `false`, integers and floats keep their kind, quoted
    /// text has its quotes removed, anything else is a string.
    pub fn from_literal(text: &str) -> Self {
        let text = text.trim();
        match text {
            "null" => return Value::Null,
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(n) = text.parse::<i64>() {
            return Value::Int(n);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Value::Float(f);
        }
        let unquoted = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
            .unwrap_or(text);
        Value::Str(unquoted.to_string())
    }

    /// Equality used by `equals` conditions
    ///
    /// Numbers compare by numeric value across int/float, and a string
    /// literal equals a scalar whose text form is identical.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Str(s), Value::Int(_) | Value::Float(_) | Value::Bool(_))
            | (Value::Int(_) | Value::Float(_) | Value::Bool(_), Value::Str(s)) => {
                let scalar = if matches!(self, Value::Str(_)) { other } else { self };
                scalar.to_string() == *s
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join("|"))
            }
            Value::Object(handle) => write!(f, "{}#{}", handle.class, handle.id),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ObjectHandle> for Value {
    fn from(handle: ObjectHandle) -> Self {
        Value::Object(handle)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
