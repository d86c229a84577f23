//! Class metadata
//!
//! Class-wide hooks are stored under the class that declared them and apply
//! to every instance that is-a that class. The engine learns the hierarchy
//! from declarations the host makes here, and caches the resolved lineage
//! per concrete class name so it is computed once and shared by every
//! instance.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use super::value::{PrimitiveTag, Value};

/// Declaration of one class or interface
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    /// Class or interface name
    pub name: String,
    /// Direct parent classes
    pub parents: Vec<String>,
    /// Directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Ordinary members that can never be intercepted
    pub concrete_members: HashSet<String>,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a parent class
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Declare ordinary members
    pub fn concrete<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.concrete_members
            .extend(members.into_iter().map(Into::into));
        self
    }
}

/// Registry of class declarations with a lineage cache
#[derive(Debug, Default)]
pub struct ClassTable {
    declared: RwLock<HashMap<String, ClassInfo>>,
    lineage_cache: RwLock<HashMap<String, Arc<[String]>>>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) a class
    ///
    /// Any change to the hierarchy invalidates every cached lineage.
    pub fn declare(&self, info: ClassInfo) {
        tracing::debug!(
            "[ClassTable] Declaring {} (parents: {:?}, interfaces: {:?})",
            info.name,
            info.parents,
            info.interfaces
        );
        self.declared
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(info.name.clone(), info);
        self.lineage_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn is_declared(&self, class: &str) -> bool {
        self.declared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(class)
    }

    /// The class itself followed by every ancestor and interface
    ///
    /// Breadth-first, deduplicated. Undeclared classes resolve to themselves.
    pub fn lineage(&self, class: &str) -> Arc<[String]> {
        if let Some(cached) = self
            .lineage_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class)
        {
            return Arc::clone(cached);
        }

        let resolved: Arc<[String]> = self.resolve(class).into();
        self.lineage_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class.to_string(), Arc::clone(&resolved));
        resolved
    }

    fn resolve(&self, class: &str) -> Vec<String> {
        let declared = self.declared.read().unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([class.to_string()]);

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(info) = declared.get(&name) {
                queue.extend(info.parents.iter().cloned());
                queue.extend(info.interfaces.iter().cloned());
            }
            order.push(name);
        }
        order
    }

    /// Whether `class` is, inherits from, or implements `ancestor`
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        self.lineage(class).iter().any(|c| c == ancestor)
    }

    /// Whether `member` is declared as an ordinary member anywhere in the lineage
    pub fn is_concrete_member(&self, class: &str, member: &str) -> bool {
        let lineage = self.lineage(class);
        let declared = self.declared.read().unwrap_or_else(PoisonError::into_inner);
        lineage.iter().any(|c| {
            declared
                .get(c)
                .map(|info| info.concrete_members.contains(member))
                .unwrap_or(false)
        })
    }

    /// Type classifier for `instanceof` conditions
    ///
    /// `type_name` is either a primitive tag (`array`, `bool`, `float`,
    /// `int`, `null`, `object`, `string`) or a class/interface name.
    pub fn is_instance_of(&self, value: &Value, type_name: &str) -> bool {
        if let Some(tag) = PrimitiveTag::parse(type_name) {
            return value.tag() == tag;
        }
        match value {
            Value::Object(handle) => self.is_a(&handle.class, type_name),
            _ => false,
        }
    }
}
