//! Host object boundary
//!
//! The engine never owns host objects. It sees them through [`Hookable`],
//! which is all it needs to find and run the concrete implementation of a
//! hookable member and to evaluate object conditions.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::{ObjectHandle, Value};

/// Identity of one host object instance
///
/// Local hooks are keyed by this id, and instance conditions compare it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Create a fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// An object whose members can be intercepted
///
/// Concrete hookable implementations are found by name: the engine prefixes
/// the member name with the configured hookable prefix (`___` by default)
/// and asks the object whether it has a member by that name.
///
/// # Example
///
/// ```ignore
/// struct Calculator { id: ObjectId }
///
/// impl Hookable for Calculator {
///     fn class_name(&self) -> &str { "Calculator" }
///     fn object_id(&self) -> ObjectId { self.id }
///     fn has_hookable(&self, name: &str) -> bool { name == "___add" }
///     fn call_hookable(&mut self, name: &str, args: &[Value]) -> Value {
///         match name {
///             "___add" => Value::Int(args[0].as_i64().unwrap_or(0) + 10),
///             _ => Value::Null,
///         }
///     }
/// }
/// ```
pub trait Hookable {
    /// Concrete class name, used for class-wide hook lookup
    fn class_name(&self) -> &str;

    /// Identity of this instance
    fn object_id(&self) -> ObjectId;

    /// Whether a concrete hookable implementation exists under the transformed name
    fn has_hookable(&self, _name: &str) -> bool {
        false
    }

    /// Invoke the concrete hookable implementation under the transformed name
    fn call_hookable(&mut self, _name: &str, _args: &[Value]) -> Value {
        Value::Null
    }

    /// Whether `name` is an ordinary member that can never be intercepted
    fn has_concrete(&self, _name: &str) -> bool {
        false
    }

    /// Field visible to object selectors
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Handle carrying this object's identity, for passing it as a value
    fn handle(&self) -> ObjectHandle {
        ObjectHandle::new(self.class_name(), self.object_id())
    }
}
