//! Hook Types
//!
//! Core types for the hooks system:
//! - `HookKind` - Method calls, property reads, or both
//! - `HookPhase` - Before or after the real implementation
//! - `HookOptions` - Per-registration options
//! - `HookEvent` - Mutable context passed to hooks
//! - `HookOutcome` - Result returned from hooks

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::priority::PriorityKey;
use super::record::HookId;
use super::registry::Registry;
use crate::core::{Hookable, Value};

static NULL: Value = Value::Null;

/// Which kind of access a hook intercepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Calls to a hookable method
    #[default]
    Method,
    /// Reads of a hookable property
    Property,
    /// Both
    Either,
}

impl HookKind {
    /// Whether a hook of this kind applies to an access of `requested` kind
    pub fn applies_to(self, requested: HookKind) -> bool {
        self == HookKind::Either || requested == HookKind::Either || self == requested
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Method => write!(f, "method"),
            HookKind::Property => write!(f, "property"),
            HookKind::Either => write!(f, "either"),
        }
    }
}

/// Dispatch phase a hook is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Before the real implementation runs
    Before,
    /// After the real implementation (or its replacement) produced a value
    After,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Before => write!(f, "before"),
            HookPhase::After => write!(f, "after"),
        }
    }
}

/// Options for one registration
///
/// ```ignore
/// let options = HookOptions::new()
///     .before()
///     .with_priority(50)
///     .with_data("audit");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HookOptions {
    /// Run before the real implementation
    pub run_before: bool,
    /// Run after the real implementation
    pub run_after: bool,
    /// Method, property, or either
    pub kind: HookKind,
    /// Explicit priority; the configured default when unset
    pub priority: Option<PriorityKey>,
    /// Value handed to the hook on every call
    pub data: Option<Value>,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            run_before: false,
            run_after: true,
            kind: HookKind::Method,
            priority: None,
            data: None,
        }
    }
}

impl HookOptions {
    /// After-only method hook at the default priority
    pub fn new() -> Self {
        Self::default()
    }

    /// Run before only
    pub fn before(mut self) -> Self {
        self.run_before = true;
        self.run_after = false;
        self
    }

    /// Run after only
    pub fn after(mut self) -> Self {
        self.run_before = false;
        self.run_after = true;
        self
    }

    /// Run in both phases
    pub fn both(mut self) -> Self {
        self.run_before = true;
        self.run_after = true;
        self
    }

    /// Set the kind of access intercepted
    pub fn with_kind(mut self, kind: HookKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set an explicit priority
    pub fn with_priority(mut self, priority: impl Into<PriorityKey>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Attach data the hook can read from its event
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Mutable context passed to hooks
///
/// Hooks can:
/// - Read and modify the call arguments (visible to the real
///   implementation and to every later hook)
/// - Read the current return value (after phase)
/// - Read named arguments (captures of a path hook)
/// - Call back into the registry, e.g. to remove themselves
pub struct HookEvent<'a> {
    /// The object whose member is being called
    pub object: &'a mut dyn Hookable,

    /// Member name, without the hookable prefix
    pub method: &'a str,

    /// Phase this hook is running in
    pub phase: HookPhase,

    /// Call arguments - can be modified by hook
    pub arguments: &'a mut Vec<Value>,

    /// Id of the running hook
    pub id: &'a HookId,

    /// `data` option of the running hook
    pub data: Option<&'a Value>,

    /// Registry dispatching this call
    pub registry: &'a Registry,

    pub(crate) return_value: &'a Value,
    pub(crate) named: &'a BTreeMap<String, Value>,
}

impl<'a> HookEvent<'a> {
    /// Positional argument, null when missing
    pub fn argument(&self, index: usize) -> &Value {
        self.arguments.get(index).unwrap_or(&NULL)
    }

    /// Replace a positional argument, padding with nulls if needed
    pub fn set_argument(&mut self, index: usize, value: impl Into<Value>) {
        if self.arguments.len() <= index {
            self.arguments.resize(index + 1, Value::Null);
        }
        self.arguments[index] = value.into();
    }

    /// Current return value
    ///
    /// In the after phase this is what the real implementation (or an
    /// earlier hook) produced. Change it by returning [`HookOutcome::value`].
    pub fn return_value(&self) -> &Value {
        self.return_value
    }

    /// Named argument, e.g. a path hook capture
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// All named arguments
    pub fn named_arguments(&self) -> &BTreeMap<String, Value> {
        self.named
    }

    /// Remove the running hook from the registry
    ///
    /// Takes effect for later calls; the current call keeps its resolved order.
    pub fn remove_self(&self) {
        self.registry.remove_hook(self.id);
    }
}

/// Result returned from a hook
///
/// The single channel through which a hook influences the call. For most
/// hooks, return `HookOutcome::none()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookOutcome {
    /// New current return value
    pub value: Option<Value>,

    /// Skip the real implementation (before phase only)
    pub replace: bool,

    /// Run no further hooks for this call
    pub cancel: bool,
}

impl HookOutcome {
    /// No change - continue with default behavior
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the current return value
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Skip the real implementation and use `value` as its result
    pub fn replace(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            replace: true,
            cancel: false,
        }
    }

    /// Stop running hooks for this call
    pub fn cancel() -> Self {
        Self {
            cancel: true,
            ..Default::default()
        }
    }

    /// Also stop running hooks for this call
    pub fn and_cancel(mut self) -> Self {
        self.cancel = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_applies() {
        assert!(HookKind::Method.applies_to(HookKind::Method));
        assert!(!HookKind::Method.applies_to(HookKind::Property));
        assert!(HookKind::Either.applies_to(HookKind::Property));
        assert!(HookKind::Property.applies_to(HookKind::Either));
    }

    #[test]
    fn test_options_builders() {
        let options = HookOptions::new();
        assert!(options.run_after && !options.run_before);

        let options = HookOptions::new().before().with_priority(50).with_data("x");
        assert!(options.run_before && !options.run_after);
        assert_eq!(options.priority, Some(PriorityKey::new(50, 0)));
        assert_eq!(options.data, Some(Value::from("x")));

        let options = HookOptions::new().both();
        assert!(options.run_before && options.run_after);
    }

    #[test]
    fn test_outcome_builders() {
        assert_eq!(HookOutcome::none(), HookOutcome::default());

        let outcome = HookOutcome::replace("X");
        assert!(outcome.replace);
        assert_eq!(outcome.value, Some(Value::from("X")));

        let outcome = HookOutcome::value(1).and_cancel();
        assert!(outcome.cancel && !outcome.replace);
    }
}
