//! Priority keys and scheduling
//!
//! Every hook in a pool sits under a unique [`PriorityKey`]. A key is a base
//! priority plus a sub-index: registering a second hook at `100` yields
//! `100.1`, a third `100.2`, so insertion order is preserved without a
//! secondary sort. Keys order naturally (numerically by base, then by
//! sub-index), lower first.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::core::HookError;

/// Sortable position of a hook within a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PriorityKey {
    /// Base priority
    pub major: i64,
    /// Collision sub-index
    pub minor: u32,
}

impl PriorityKey {
    pub fn new(major: i64, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Next sub-slot at the same base priority; `None` when sub-slots run out
    pub fn next_slot(self) -> Option<Self> {
        Some(Self {
            major: self.major,
            minor: self.minor.checked_add(1)?,
        })
    }
}

impl From<i64> for PriorityKey {
    fn from(major: i64) -> Self {
        Self::new(major, 0)
    }
}

impl From<i32> for PriorityKey {
    fn from(major: i32) -> Self {
        Self::new(major as i64, 0)
    }
}

impl fmt::Display for PriorityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PriorityKey {
    type Err = HookError;

    /// Parse `"50"` or `"50.2"`
    ///
    /// The part after the dot is a sub-index of the base priority, not a
    /// fraction, so `"-0.5"` has no meaning and is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HookError::InvalidPriority(s.to_string());
        let text = s.trim();
        let (major, minor) = match text.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (text, "0"),
        };
        let major: i64 = major.parse().map_err(|_| invalid())?;
        let minor: u32 = minor.parse().map_err(|_| invalid())?;
        if major == 0 && text.starts_with('-') && minor > 0 {
            return Err(invalid());
        }
        Ok(Self { major, minor })
    }
}

impl Serialize for PriorityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// First free key at or after `wanted`
///
/// `None` when every sub-slot from `wanted` on is taken.
pub fn free_slot<V>(taken: &BTreeMap<PriorityKey, V>, wanted: PriorityKey) -> Option<PriorityKey> {
    let mut key = wanted;
    while taken.contains_key(&key) {
        key = key.next_slot()?;
    }
    Some(key)
}

/// Merge instance-local and class-wide hooks into one execution order
///
/// Local hooks keep their keys. Class-wide hooks are added in lineage order
/// and, on collision, move to the next free sub-slot, so nothing is dropped.
pub fn merge<'a, V, L, F>(local: Option<&'a BTreeMap<PriorityKey, V>>, statics: L, keep: F) -> Vec<V>
where
    V: Clone + 'a,
    L: IntoIterator<Item = &'a BTreeMap<PriorityKey, V>>,
    F: Fn(&V) -> bool,
{
    let mut merged: BTreeMap<PriorityKey, V> = BTreeMap::new();

    if let Some(local) = local {
        for (key, value) in local {
            if keep(value) {
                merged.insert(*key, value.clone());
            }
        }
    }

    // Hooks that found no free sub-slot still run, last
    let mut overflow = Vec::new();
    for pool in statics {
        for (key, value) in pool {
            if keep(value) {
                match free_slot(&merged, *key) {
                    Some(slot) => {
                        merged.insert(slot, value.clone());
                    }
                    None => overflow.push(value.clone()),
                }
            }
        }
    }

    merged.into_values().chain(overflow).collect()
}
