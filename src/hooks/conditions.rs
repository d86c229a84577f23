//! Hook conditions
//!
//! A hook may be restricted to calls where the object, a positional
//! argument, or the current return value satisfies a condition. Conditions
//! are evaluated per call, right before the hook would run; a hook whose
//! condition fails is skipped for that call only.
//!
//! Evaluation is side-effect free and never fails: a selector that cannot
//! be evaluated counts as "no match".

use std::collections::BTreeMap;
use std::fmt;

use crate::core::{ClassTable, Hookable, ObjectId, Value};
use crate::selector::{ObjectFields, SelectorMatcher, SingleField, VALUE_FIELD};

/// Characters that start an operator-prefixed selector (`=foo`, `>5`)
const OPERATOR_STARTS: &[char] = &['=', '!', '<', '>', '*', '%', '^', '$', '~'];

/// Condition on the object whose member is called
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectCondition {
    /// Exactly this instance
    Instance(ObjectId),
    /// Object properties match a selector
    Selector(String),
}

/// Condition on an argument or return value
#[derive(Debug, Clone, PartialEq)]
pub enum ValueCondition {
    /// Value equals this one
    Equals(Value),
    /// Value matches a selector
    ///
    /// Operator-prefixed expressions (`>5`, `=foo`) test the value itself;
    /// `field=value` expressions test the fields of an object value.
    Selector(String),
    /// Value is an instance of any listed class, interface or primitive tag
    InstanceOf(Vec<String>),
}

impl ValueCondition {
    pub fn equals(value: impl Into<Value>) -> Self {
        ValueCondition::Equals(value.into())
    }

    pub fn selector(expression: impl Into<String>) -> Self {
        ValueCondition::Selector(expression.into())
    }

    pub fn instance_of<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ValueCondition::InstanceOf(types.into_iter().map(Into::into).collect())
    }

    /// Classify an expression written in a method spec
    ///
    /// - `<Page|null>` is a type check
    /// - `>5`, `=foo`, `template=home` are selectors
    /// - anything else is an equality literal
    pub fn classify(expression: &str) -> Self {
        let expr = expression.trim();

        if let Some(types) = parse_type_list(expr) {
            return ValueCondition::InstanceOf(types);
        }
        if expr.starts_with(OPERATOR_STARTS) || looks_like_selector(expr) {
            return ValueCondition::Selector(expr.to_string());
        }
        ValueCondition::Equals(Value::from_literal(expr))
    }
}

/// `<A|B>` with identifier-only entries
fn parse_type_list(expr: &str) -> Option<Vec<String>> {
    let inner = expr.strip_prefix('<')?.strip_suffix('>')?;
    let types: Vec<String> = inner.split('|').map(|t| t.trim().to_string()).collect();
    let valid = types.iter().all(|t| {
        !t.is_empty()
            && t
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\\')
    });
    valid.then_some(types)
}

/// `field=value`, `field>3` and friends, outside quotes
fn looks_like_selector(expr: &str) -> bool {
    if expr.starts_with('"') || expr.starts_with('\'') {
        return false;
    }
    expr.contains(['=', '<', '>'])
}

/// Everything a hook's conditions need to be evaluated
#[derive(Clone, Copy)]
pub struct ConditionContext<'a> {
    pub selectors: &'a dyn SelectorMatcher,
    pub classes: &'a ClassTable,
}

impl ConditionContext<'_> {
    /// Check an object condition
    pub fn object_matches(&self, condition: &ObjectCondition, object: &dyn Hookable) -> bool {
        match condition {
            ObjectCondition::Instance(id) => object.object_id() == *id,
            ObjectCondition::Selector(expr) => {
                self.selector_matches(expr, &ObjectFields(object))
            }
        }
    }

    /// Check an argument or return condition
    pub fn value_matches(&self, condition: &ValueCondition, value: &Value) -> bool {
        match condition {
            ValueCondition::Equals(expected) => expected.loosely_equals(value),
            ValueCondition::InstanceOf(types) => types
                .iter()
                .any(|type_name| self.classes.is_instance_of(value, type_name)),
            ValueCondition::Selector(expr) => {
                if expr.starts_with(OPERATOR_STARTS) {
                    let expr = format!("{}{}", VALUE_FIELD, expr);
                    self.selector_matches(&expr, &SingleField::value(value))
                } else if let Value::Object(handle) = value {
                    self.selector_matches(expr, handle)
                } else {
                    self.selector_matches(expr, &SingleField::value(value))
                }
            }
        }
    }

    fn selector_matches(&self, expr: &str, candidate: &dyn crate::selector::Selectable) -> bool {
        match self.selectors.matches(expr, candidate) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::debug!("[Conditions] Selector '{}' failed: {} (treated as no match)", expr, e);
                false
            }
        }
    }
}

/// All conditions attached to one hook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookConditions {
    /// Condition on the called object
    pub object: Option<ObjectCondition>,
    /// Conditions on positional arguments, by index
    pub arguments: BTreeMap<usize, ValueCondition>,
    /// Condition on the current return value (after phase only)
    pub returns: Option<ValueCondition>,
}

impl HookConditions {
    pub fn is_empty(&self) -> bool {
        self.object.is_none() && self.arguments.is_empty() && self.returns.is_none()
    }

    /// Check object and argument conditions, and the return condition when
    /// a return value is given
    ///
    /// Missing arguments are treated as null.
    pub fn check(
        &self,
        ctx: &ConditionContext<'_>,
        object: &dyn Hookable,
        arguments: &[Value],
        return_value: Option<&Value>,
    ) -> bool {
        if let Some(condition) = &self.object {
            if !ctx.object_matches(condition, object) {
                return false;
            }
        }

        let null = Value::Null;
        let arguments_match = self.arguments.iter().all(|(index, condition)| {
            ctx.value_matches(condition, arguments.get(*index).unwrap_or(&null))
        });
        if !arguments_match {
            return false;
        }

        match (&self.returns, return_value) {
            (Some(condition), Some(value)) => ctx.value_matches(condition, value),
            _ => true,
        }
    }
}

impl fmt::Display for ValueCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueCondition::Equals(value) => write!(f, "{}", value),
            ValueCondition::Selector(expr) => write!(f, "{}", expr),
            ValueCondition::InstanceOf(types) => write!(f, "<{}>", types.join("|")),
        }
    }
}

impl fmt::Display for HookConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        match &self.object {
            Some(ObjectCondition::Instance(id)) => parts.push(format!("object=#{}", id)),
            Some(ObjectCondition::Selector(expr)) => parts.push(format!("object({})", expr)),
            None => {}
        }
        for (index, condition) in &self.arguments {
            parts.push(format!("arg{}({})", index, condition));
        }
        if let Some(condition) = &self.returns {
            parts.push(format!("return({})", condition));
        }
        write!(f, "{}", parts.join(" "))
    }
}
