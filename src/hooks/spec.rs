//! Method specs
//!
//! A [`HookSpec`] says which member a hook intercepts and under which
//! conditions. Build it directly:
//!
//! ```ignore
//! let spec = HookSpec::method("save")
//!     .class("Pages")
//!     .argument(0, ValueCondition::selector("template=product"));
//! ```
//!
//! or parse the compact string form:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `render` | member `render` |
//! | `Page::render` | class-wide, any instance that is-a `Page` |
//! | `Page(template=home)::render` | ... whose properties match a selector |
//! | `save(template=product)` | argument 0 matches |
//! | `save(0:foo, 2:<Page>)` | arguments 0 and 2 match |
//! | `render:(=ok)` | return value matches (after hooks only) |
//! | `find:<Page\|null>` | return value is one of these types |
//! | `a, b` | two hooks, one per spec |

use std::collections::BTreeMap;

use super::conditions::{HookConditions, ObjectCondition, ValueCondition};
use crate::core::{HookError, HookResult, ObjectId};

/// Which member a hook intercepts, and when
#[derive(Debug, Clone, PartialEq)]
pub struct HookSpec {
    /// Member name
    pub method: String,
    /// Declaring class; makes the hook class-wide
    pub class: Option<String>,
    /// Per-call conditions
    pub conditions: HookConditions,
}

impl HookSpec {
    /// Spec for `method` with no class and no conditions
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            method: name.into(),
            class: None,
            conditions: HookConditions::default(),
        }
    }

    /// Apply to every instance that is-a `class`
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Only when the object's properties match `selector`
    pub fn object_selector(mut self, selector: impl Into<String>) -> Self {
        self.conditions.object = Some(ObjectCondition::Selector(selector.into()));
        self
    }

    /// Only when called on this exact instance
    pub fn object_instance(mut self, id: ObjectId) -> Self {
        self.conditions.object = Some(ObjectCondition::Instance(id));
        self
    }

    /// Only when argument `index` satisfies `condition`
    pub fn argument(mut self, index: usize, condition: ValueCondition) -> Self {
        self.conditions.arguments.insert(index, condition);
        self
    }

    /// Only when the current return value satisfies `condition`
    pub fn returns(mut self, condition: ValueCondition) -> Self {
        self.conditions.returns = Some(condition);
        self
    }

    /// Parse a spec naming exactly one member
    pub fn parse(spec: &str) -> HookResult<Self> {
        let mut specs = Self::parse_many(spec)?;
        if specs.len() != 1 {
            return Err(HookError::invalid_spec(spec, "expected a single method"));
        }
        Ok(specs.remove(0))
    }

    /// Parse a comma-separated list of specs
    pub fn parse_many(spec: &str) -> HookResult<Vec<Self>> {
        let parts = split_top_level(spec);
        if parts.is_empty() {
            return Err(HookError::invalid_spec(spec, "empty spec"));
        }
        parts.into_iter().map(parse_one).collect()
    }
}

/// Split on commas outside parentheses and quotes
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Index of the `)` closing the `(` at `open`
fn closing_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in text[open..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Position of `::` outside parentheses
fn find_class_separator(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => return Some(i),
            _ => {}
        }
    }
    None
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\\')
}

fn parse_one(spec: &str) -> HookResult<HookSpec> {
    let invalid = |reason: &str| HookError::invalid_spec(spec, reason);

    let (class_part, member_part) = match find_class_separator(spec) {
        Some(pos) => (Some(spec[..pos].trim()), spec[pos + 2..].trim()),
        None => (None, spec),
    };

    let mut conditions = HookConditions::default();

    let class = match class_part {
        Some(part) => {
            let (name, selector) = split_call(part).ok_or_else(|| invalid("unbalanced parentheses after class"))?;
            if !is_identifier(name) {
                return Err(invalid("invalid class name"));
            }
            if let Some(selector) = selector {
                if selector.is_empty() {
                    return Err(invalid("empty object selector"));
                }
                conditions.object = Some(ObjectCondition::Selector(selector.to_string()));
            }
            Some(name.to_string())
        }
        None => None,
    };

    let name_end = member_part
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(member_part.len());
    let method = &member_part[..name_end];
    if method.is_empty() {
        return Err(invalid("missing method name"));
    }
    let mut rest = &member_part[name_end..];

    if rest.starts_with('(') {
        let close = closing_paren(rest, 0).ok_or_else(|| invalid("unbalanced argument parentheses"))?;
        conditions.arguments = parse_arguments(&rest[1..close]).map_err(|reason| invalid(&reason))?;
        rest = &rest[close + 1..];
    }

    if let Some(ret) = rest.strip_prefix(':') {
        let ret = ret.trim();
        let condition = if ret.starts_with('(') {
            let close = closing_paren(ret, 0).ok_or_else(|| invalid("unbalanced return parentheses"))?;
            if close != ret.len() - 1 {
                return Err(invalid("unexpected text after return condition"));
            }
            ValueCondition::classify(&ret[1..close])
        } else if ret.starts_with('<') && ret.ends_with('>') {
            ValueCondition::classify(ret)
        } else {
            return Err(invalid("return condition must be (expr) or <Type>"));
        };
        conditions.returns = Some(condition);
        rest = "";
    }

    if !rest.trim().is_empty() {
        return Err(invalid("unexpected text after method name"));
    }

    Ok(HookSpec {
        method: method.to_string(),
        class,
        conditions,
    })
}

/// `Name` or `Name(inner)`
fn split_call(part: &str) -> Option<(&str, Option<&str>)> {
    match part.find('(') {
        None => Some((part, None)),
        Some(open) => {
            let close = closing_paren(part, open)?;
            if close != part.len() - 1 {
                return None;
            }
            Some((part[..open].trim(), Some(part[open + 1..close].trim())))
        }
    }
}

/// `expr` (argument 0) or `0:expr, 2:expr`
fn parse_arguments(inner: &str) -> Result<BTreeMap<usize, ValueCondition>, String> {
    let inner = inner.trim();
    let mut conditions = BTreeMap::new();
    if inner.is_empty() {
        return Ok(conditions);
    }

    if leading_index(inner).is_none() {
        conditions.insert(0, ValueCondition::classify(inner));
        return Ok(conditions);
    }

    // Commas inside one argument's selector belong to that argument
    let mut current: Option<(usize, String)> = None;
    for part in split_top_level(inner) {
        match leading_index(part) {
            Some((index, expr)) => {
                if let Some((i, expr)) = current.take() {
                    conditions.insert(i, ValueCondition::classify(&expr));
                }
                current = Some((index, expr.to_string()));
            }
            None => match current.as_mut() {
                Some((_, expr)) => {
                    expr.push_str(", ");
                    expr.push_str(part);
                }
                None => return Err(format!("argument condition '{}' has no index", part)),
            },
        }
    }
    if let Some((i, expr)) = current {
        conditions.insert(i, ValueCondition::classify(&expr));
    }
    Ok(conditions)
}

/// `2:expr` -> (2, "expr")
fn leading_index(part: &str) -> Option<(usize, &str)> {
    let (index, expr) = part.split_once(':')?;
    let index = index.trim();
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((index.parse().ok()?, expr.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_method() {
        let spec = HookSpec::parse("render").unwrap();
        assert_eq!(spec, HookSpec::method("render"));
    }

    #[test]
    fn test_class_and_object_selector() {
        let spec = HookSpec::parse("Page(template=home, id>5)::render").unwrap();
        assert_eq!(spec.class.as_deref(), Some("Page"));
        assert_eq!(spec.method, "render");
        assert_eq!(
            spec.conditions.object,
            Some(ObjectCondition::Selector("template=home, id>5".into()))
        );
    }

    #[test]
    fn test_argument_forms() {
        let spec = HookSpec::parse("Pages::save(template=product, id>5)").unwrap();
        assert_eq!(
            spec.conditions.arguments.get(&0),
            Some(&ValueCondition::selector("template=product, id>5"))
        );

        let spec = HookSpec::parse("save(0:foo, 2:<Page|null>)").unwrap();
        assert_eq!(spec.conditions.arguments.get(&0), Some(&ValueCondition::equals("foo")));
        assert_eq!(
            spec.conditions.arguments.get(&2),
            Some(&ValueCondition::instance_of(["Page", "null"]))
        );
        assert!(spec.conditions.arguments.get(&1).is_none());

        let spec = HookSpec::parse("save(1:template=a, id>5)").unwrap();
        assert_eq!(
            spec.conditions.arguments.get(&1),
            Some(&ValueCondition::selector("template=a, id>5"))
        );
    }

    #[test]
    fn test_return_forms() {
        let spec = HookSpec::parse("render:(=ok)").unwrap();
        assert_eq!(spec.conditions.returns, Some(ValueCondition::selector("=ok")));

        let spec = HookSpec::parse("Pages::find(id>0):<Page|null>").unwrap();
        assert_eq!(
            spec.conditions.returns,
            Some(ValueCondition::instance_of(["Page", "null"]))
        );
        assert_eq!(spec.conditions.arguments.len(), 1);
    }

    #[test]
    fn test_parse_many() {
        let specs = HookSpec::parse_many("Page::render, save(a, b), Pages::find").unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[1].method, "save");
        assert_eq!(
            specs[1].conditions.arguments.get(&0),
            Some(&ValueCondition::equals("a, b"))
        );
        assert!(HookSpec::parse("a, b").is_err());
    }

    #[test]
    fn test_malformed_specs() {
        for bad in [
            "",
            "Page::",
            "::render",
            "Page(::render",
            "render(foo",
            "render:foo",
            "render extra",
            "Pa ge::render",
            "Page()::render",
        ] {
            assert!(HookSpec::parse(bad).is_err(), "expected '{}' to be rejected", bad);
        }
    }
}
