//! Default selector implementation
//!
//! Grammar: comma-separated clauses, all of which must match.
//! Each clause is `field op value`; either side may list `|` alternatives,
//! and the clause matches when any field/value pair does.

use std::cmp::Ordering;

use super::{Selectable, SelectorError, SelectorMatcher};
use crate::core::Value;

/// Operators, longest first so `<=` wins over `<`
const OPERATORS: &[(&str, Op)] = &[
    ("!=", Op::NotEqual),
    ("<=", Op::LessOrEqual),
    (">=", Op::GreaterOrEqual),
    ("*=", Op::Contains),
    ("%=", Op::ContainsInsensitive),
    ("^=", Op::StartsWith),
    ("$=", Op::EndsWith),
    ("~=", Op::ContainsWords),
    ("=", Op::Equal),
    ("<", Op::Less),
    (">", Op::Greater),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
    ContainsInsensitive,
    StartsWith,
    EndsWith,
    ContainsWords,
}

#[derive(Debug)]
struct Clause<'a> {
    fields: Vec<&'a str>,
    op: Op,
    values: Vec<&'a str>,
}

/// Minimal selector engine used when the host provides none
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSelector;

impl SimpleSelector {
    pub fn new() -> Self {
        Self
    }
}

impl SelectorMatcher for SimpleSelector {
    fn matches(&self, expression: &str, candidate: &dyn Selectable) -> Result<bool, SelectorError> {
        let clauses = parse(expression)?;
        Ok(clauses.iter().all(|clause| clause_matches(clause, candidate)))
    }
}

fn parse(expression: &str) -> Result<Vec<Clause<'_>>, SelectorError> {
    let parts = split_clauses(expression);
    if parts.is_empty() {
        return Err(SelectorError::Empty);
    }
    parts.into_iter().map(parse_clause).collect()
}

/// Split on commas outside quotes
fn split_clauses(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in expression.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                parts.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_clause(text: &str) -> Result<Clause<'_>, SelectorError> {
    let (pos, token, op) = find_operator(text)
        .ok_or_else(|| SelectorError::MissingOperator(text.to_string()))?;

    let field_part = text[..pos].trim();
    if field_part.is_empty() {
        return Err(SelectorError::MissingField(text.to_string()));
    }
    let value_part = text[pos + token.len()..].trim();

    Ok(Clause {
        fields: field_part.split('|').map(str::trim).collect(),
        op,
        values: value_part.split('|').map(|v| unquote(v.trim())).collect(),
    })
}

/// Earliest operator in the clause
fn find_operator(text: &str) -> Option<(usize, &'static str, Op)> {
    text.char_indices().find_map(|(i, _)| {
        OPERATORS
            .iter()
            .find(|(token, _)| text[i..].starts_with(token))
            .map(|(token, op)| (i, *token, *op))
    })
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
        .unwrap_or(text)
}

fn clause_matches(clause: &Clause<'_>, candidate: &dyn Selectable) -> bool {
    let any_pair = |op: Op| {
        clause.fields.iter().any(|field| {
            let actual = candidate.field(field).unwrap_or(Value::Null);
            clause
                .values
                .iter()
                .any(|expected| value_matches(&actual, op, expected))
        })
    };

    match clause.op {
        Op::NotEqual => !any_pair(Op::Equal),
        op => any_pair(op),
    }
}

fn value_matches(actual: &Value, op: Op, expected: &str) -> bool {
    if let Value::Array(items) = actual {
        return items.iter().any(|item| value_matches(item, op, expected));
    }

    let text = actual.to_string();
    match op {
        Op::Equal | Op::NotEqual => compare(actual, &text, expected) == Some(Ordering::Equal),
        Op::Less => compare(actual, &text, expected) == Some(Ordering::Less),
        Op::LessOrEqual => matches!(
            compare(actual, &text, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Op::Greater => compare(actual, &text, expected) == Some(Ordering::Greater),
        Op::GreaterOrEqual => matches!(
            compare(actual, &text, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Op::Contains => text.contains(expected),
        Op::ContainsInsensitive => text.to_lowercase().contains(&expected.to_lowercase()),
        Op::StartsWith => text.starts_with(expected),
        Op::EndsWith => text.ends_with(expected),
        Op::ContainsWords => {
            let haystack = text.to_lowercase();
            expected
                .split_whitespace()
                .all(|word| haystack.contains(&word.to_lowercase()))
        }
    }
}

/// Numeric when both sides are numbers, text otherwise
fn compare(actual: &Value, text: &str, expected: &str) -> Option<Ordering> {
    let actual_num = match actual {
        Value::Null | Value::Bool(_) => None,
        other => other.as_f64(),
    };
    match (actual_num, expected.trim().parse::<f64>().ok()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(text.cmp(expected)),
    }
}
