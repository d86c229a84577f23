//! Selector Module
//!
//! Object, argument and return conditions can be written as selector
//! expressions (`template=basic-page, id>10`). The hook engine treats the
//! selector language as an external capability: it only needs to ask
//! "does this candidate match this expression".
//!
//! A candidate is anything [`Selectable`]: a host object, an object handle
//! passed as an argument, or a synthetic single-field record wrapping a
//! scalar argument or return value.
//!
//! [`SimpleSelector`] is the default implementation; hosts with a richer
//! query language plug in their own [`SelectorMatcher`].

mod simple;

pub use simple::SimpleSelector;

use thiserror::Error;

use crate::core::{Hookable, ObjectHandle, Value};

/// Name of the field a synthetic single-value record exposes
pub const VALUE_FIELD: &str = "_value";

/// Errors from evaluating a selector expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    /// Expression was empty
    #[error("Empty selector")]
    Empty,

    /// A clause had no recognised operator
    #[error("No operator in selector clause '{0}'")]
    MissingOperator(String),

    /// A clause had an operator but no field name
    #[error("No field in selector clause '{0}'")]
    MissingField(String),
}

/// Something a selector can be evaluated against
pub trait Selectable {
    /// Value of a named field, if present
    fn field(&self, name: &str) -> Option<Value>;
}

/// Evaluates selector expressions
pub trait SelectorMatcher: Send + Sync {
    /// Check whether `candidate` matches `expression`
    fn matches(&self, expression: &str, candidate: &dyn Selectable) -> Result<bool, SelectorError>;
}

impl Selectable for ObjectHandle {
    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }
}

/// Exposes a host object's properties to selectors
pub struct ObjectFields<'a>(pub &'a dyn Hookable);

impl Selectable for ObjectFields<'_> {
    fn field(&self, name: &str) -> Option<Value> {
        self.0.property(name)
    }
}

/// Synthetic record holding a single named value
#[derive(Debug, Clone)]
pub struct SingleField<'a> {
    pub name: &'a str,
    pub value: &'a Value,
}

impl<'a> SingleField<'a> {
    /// Record exposing `value` under [`VALUE_FIELD`]
    pub fn value(value: &'a Value) -> Self {
        Self {
            name: VALUE_FIELD,
            value,
        }
    }
}

impl Selectable for SingleField<'_> {
    fn field(&self, name: &str) -> Option<Value> {
        (name == self.name).then(|| self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ObjectId;

    #[test]
    fn test_single_field() {
        let value = Value::from("foo");
        let record = SingleField::value(&value);
        assert_eq!(record.field(VALUE_FIELD), Some(Value::from("foo")));
        assert_eq!(record.field("other"), None);
    }

    #[test]
    fn test_handle_fields() {
        let handle = ObjectHandle::new("Page", ObjectId::new()).with_field("template", "home");
        assert_eq!(handle.field("template"), Some(Value::from("home")));
        assert_eq!(handle.field("title"), None);
    }
}
