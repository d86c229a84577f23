//! Hook records and ids

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::Serialize;

use super::conditions::HookConditions;
use super::priority::PriorityKey;
use super::target::HookTarget;
use super::types::HookKind;
use crate::core::{HookError, ObjectId, Value};

/// Which pool a hook lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookScope {
    /// Bound to one object instance
    Local(ObjectId),
    /// Bound to every instance of a class, its subclasses and implementers
    Static(String),
}

impl HookScope {
    pub fn is_local(&self) -> bool {
        matches!(self, HookScope::Local(_))
    }

    /// Declaring class of a static hook
    pub fn class(&self) -> Option<&str> {
        match self {
            HookScope::Static(class) => Some(class),
            HookScope::Local(_) => None,
        }
    }
}

/// Identifier returned on registration and used for removal
///
/// Displays as `Class:priority:method` for static hooks and
/// `:priority:method@object` for local ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookId {
    pub scope: HookScope,
    pub priority: PriorityKey,
    pub method: String,
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            HookScope::Static(class) => write!(f, "{}:{}:{}", class, self.priority, self.method),
            HookScope::Local(object) => write!(f, ":{}:{}@{}", self.priority, self.method, object),
        }
    }
}

impl FromStr for HookId {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HookError::InvalidHookId(s.to_string());
        let mut parts = s.splitn(3, ':');
        let (class, priority, rest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(class), Some(priority), Some(rest)) => (class, priority, rest),
            _ => return Err(invalid()),
        };
        let priority: PriorityKey = priority.parse().map_err(|_| invalid())?;

        let (scope, method) = if class.is_empty() {
            let (method, object) = rest.rsplit_once('@').ok_or_else(invalid)?;
            let object: ObjectId = object.parse().map_err(|_| invalid())?;
            (HookScope::Local(object), method)
        } else {
            (HookScope::Static(class.to_string()), rest)
        };

        if method.is_empty() {
            return Err(invalid());
        }
        Ok(HookId {
            scope,
            priority,
            method: method.to_string(),
        })
    }
}

impl Serialize for HookId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One registered hook
#[derive(Debug, Clone)]
pub struct HookRecord {
    /// Unique within its pool
    pub id: HookId,
    /// Member name being intercepted
    pub method: String,
    /// Method, property, or either
    pub kind: HookKind,
    /// What to call
    pub target: HookTarget,
    pub run_before: bool,
    pub run_after: bool,
    /// Conditions evaluated per call
    pub conditions: HookConditions,
    /// `data` option handed to the hook
    pub data: Option<Value>,
    /// Original pattern, for path hooks
    pub path: Option<String>,
}

impl HookRecord {
    pub fn scope(&self) -> &HookScope {
        &self.id.scope
    }

    pub fn priority(&self) -> PriorityKey {
        self.id.priority
    }

    /// Serializable summary
    pub fn info(&self) -> HookInfo {
        HookInfo {
            id: self.id.to_string(),
            method: self.method.clone(),
            kind: self.kind,
            before: self.run_before,
            after: self.run_after,
            priority: self.priority(),
            scope: if self.scope().is_local() { "local" } else { "static" },
            class: self.scope().class().map(str::to_string),
            conditions: (!self.conditions.is_empty()).then(|| self.conditions.to_string()),
            target: self.target.describe(),
            path: self.path.clone(),
        }
    }
}

/// Introspection view of a hook
#[derive(Debug, Clone, Serialize)]
pub struct HookInfo {
    pub id: String,
    pub method: String,
    pub kind: HookKind,
    pub before: bool,
    pub after: bool,
    pub priority: PriorityKey,
    pub scope: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Ids produced by one registration call
///
/// A spec listing several methods registers one hook per method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookIds(pub Vec<HookId>);

impl HookIds {
    /// First id; registrations always produce at least one
    pub fn first(&self) -> Option<&HookId> {
        self.0.first()
    }
}

impl Deref for HookIds {
    type Target = [HookId];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for HookIds {
    type Item = HookId;
    type IntoIter = std::vec::IntoIter<HookId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for HookIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "{}", ids.join(","))
    }
}
