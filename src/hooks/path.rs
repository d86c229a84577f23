//! Path hooks
//!
//! A hook whose spec starts with `/` (or a regex delimiter such as `!`) is a
//! route rather than a method. It registers under one synthetic dispatch
//! method (`PathRouter::pathHooks` by default) and is matched against
//! request paths by [`Registry::dispatch_path`].
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `/foo/bar/` | exactly `/foo/bar/` (redirects `/foo/bar`) |
//! | `/foo/{id}/` | `/foo/42/`, capturing `id = "42"` |
//! | `/blog/{pageNum}` | `/blog/`, with pagination allowed |
//! | `!^/api/v[0-9]+/.*$!i` | any path the regex matches |
//!
//! Path hooks are single-shot: a match removes the registration before its
//! target runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;

use super::conditions::HookConditions;
use super::dispatch::Phases;
use super::record::{HookId, HookRecord, HookScope};
use super::registry::{NewHook, Registry};
use super::target::HookTarget;
use super::types::{HookKind, HookOptions};
use crate::config::EngineConfig;
use crate::core::{HookError, HookResult, Hookable, Value};

const PAGE_NUM: &str = "{pageNum}";

/// A compiled path pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
    prefilter: Vec<String>,
    allows_page_num: bool,
}

/// Result of matching one request against one pattern
#[derive(Debug, Clone, PartialEq)]
pub enum PathMatch {
    /// Matched; named arguments for the target
    Matched(BTreeMap<String, Value>),
    /// Would match with the trailing slash toggled
    Redirect(String),
    NoMatch,
}

impl PathPattern {
    /// Compile a path hook spec
    pub fn compile(pattern: &str, config: &EngineConfig) -> HookResult<Self> {
        let delimiter = pattern
            .chars()
            .next()
            .filter(|c| config.path_delimiters.contains(*c))
            .ok_or_else(|| HookError::invalid_spec(pattern, "path hooks start with a path or delimiter"))?;

        let allows_page_num = pattern.contains(PAGE_NUM);
        let stripped = pattern.replace("{pageNum}/", "").replace(PAGE_NUM, "");

        let (source, body, case_insensitive) = if delimiter == '/' {
            let source = format!("^{}$", translate(&stripped));
            (source, stripped.clone(), false)
        } else {
            let open = delimiter.len_utf8();
            let close = stripped[open..]
                .rfind(delimiter)
                .map(|i| i + open)
                .ok_or_else(|| HookError::invalid_spec(pattern, "missing closing delimiter"))?;
            let body = &stripped[open..close];
            let case_insensitive = stripped[close + open..].contains('i');
            let flags = if case_insensitive { "(?i)" } else { "" };
            (format!("{}{}", flags, translate(body)), body.to_string(), case_insensitive)
        };

        let regex = Regex::new(&source).map_err(|source| HookError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let prefilter = if case_insensitive {
            Vec::new()
        } else {
            prefilter_tokens(&body)
        };

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            prefilter,
            allows_page_num,
        })
    }

    /// Pattern as registered
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Literal segments every matching path contains
    pub fn prefilter(&self) -> &[String] {
        &self.prefilter
    }

    pub fn allows_page_num(&self) -> bool {
        self.allows_page_num
    }

    /// Match one request
    pub fn try_match(&self, request: &PathRequest) -> PathMatch {
        let page_num = request.page_num.unwrap_or(1);
        if page_num > 1 && !self.allows_page_num {
            return PathMatch::NoMatch;
        }

        let path = request.path.as_str();
        let probe = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        if !self.prefilter.iter().all(|token| probe.contains(token.as_str())) {
            return PathMatch::NoMatch;
        }

        if let Some(captures) = self.regex.captures(path) {
            let mut named: BTreeMap<String, Value> = self
                .regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|m| (name.to_string(), Value::from(m.as_str())))
                })
                .collect();
            named.insert("path".to_string(), Value::from(path));
            if self.allows_page_num {
                named.insert("pageNum".to_string(), Value::from(page_num));
            }
            return PathMatch::Matched(named);
        }

        let toggled = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
            Some(_) => return PathMatch::NoMatch,
            None => format!("{}/", path),
        };
        if self.regex.is_match(&toggled) {
            PathMatch::Redirect(toggled)
        } else {
            PathMatch::NoMatch
        }
    }
}

/// `{name}` to named groups; lone periods escaped
fn translate(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 16);
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                let close = chars[i + 1..].iter().position(|&c| c == '}').map(|p| i + 1 + p);
                let name: Option<String> = close.map(|end| chars[i + 1..end].iter().collect());
                match (close, name) {
                    (Some(end), Some(name)) if is_capture_name(&name) => {
                        out.push_str(&format!("(?P<{}>[^/]+)", name));
                        i = end + 1;
                        continue;
                    }
                    _ => out.push(c),
                }
            }
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            }
            '.' => {
                let idiom = matches!(chars.get(i + 1), Some('+') | Some('*'));
                if idiom {
                    out.push('.');
                } else {
                    out.push_str("\\.");
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

fn is_capture_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Literal `/segment/` tokens, skipping anything with regex syntax
///
/// Alternation and groups can make any segment optional, so those bodies
/// get no tokens at all.
fn prefilter_tokens(body: &str) -> Vec<String> {
    if body.contains(|c| matches!(c, '|' | '(' | ')')) {
        return Vec::new();
    }

    let parts: Vec<&str> = body.split('/').collect();
    let last = parts.len().saturating_sub(1);
    let quantified = |i: usize| {
        parts.get(i).map_or(false, |next| {
            let mut chars = next.chars();
            match chars.next() {
                Some('?' | '*' | '+') => true,
                Some('{') => chars.next().map_or(false, |c| c.is_ascii_digit() || c == ','),
                _ => false,
            }
        })
    };

    parts
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(i, segment)| {
            !segment.is_empty()
                && !quantified(*i)
                && !quantified(i + 1)
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
        .map(|(i, segment)| {
            if i < last {
                format!("/{}/", segment)
            } else {
                format!("/{}", segment)
            }
        })
        .collect()
}

/// A request to route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRequest {
    pub path: String,
    /// Pagination number, when the host parsed one from the URL
    pub page_num: Option<u32>,
}

impl PathRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            page_num: None,
        }
    }

    pub fn with_page_num(mut self, page_num: u32) -> Self {
        self.page_num = Some(page_num);
        self
    }
}

/// What happened when a request was routed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathDispatch {
    /// A path hook claimed the request
    pub handled: bool,
    /// Value the claiming hook returned
    pub return_value: Value,
    /// Pattern of the claiming hook
    pub pattern: Option<String>,
    /// Named arguments the claiming hook received
    pub captures: BTreeMap<String, Value>,
    /// Slash-corrected path, when a pattern nearly matched
    pub redirect: Option<String>,
}

impl Registry {
    /// Compile a path hook spec, refusing it once routing has started
    pub(super) fn compile_path(&self, pattern: &str) -> HookResult<Arc<PathPattern>> {
        if self.read().routes_closed {
            return Err(HookError::RoutesClosed(pattern.to_string()));
        }
        Ok(Arc::new(PathPattern::compile(pattern, self.config())?))
    }

    /// Register a compiled path hook under the dispatch method
    pub(super) fn insert_path(
        &self,
        compiled: Arc<PathPattern>,
        target: HookTarget,
        options: &HookOptions,
    ) -> HookResult<HookId> {
        let config = self.config();
        self.insert(NewHook {
            scope: HookScope::Static(config.path_hook_class.clone()),
            method: config.path_hook_method.clone(),
            kind: HookKind::Method,
            target,
            run_before: false,
            run_after: true,
            priority: options.priority,
            conditions: HookConditions::default(),
            data: options.data.clone(),
            path: Some(compiled),
        })
    }

    /// Stop accepting path hooks; routing has started
    pub fn close_routes(&self) {
        self.write().routes_closed = true;
    }

    /// Accept path hooks again
    pub fn open_routes(&self) {
        self.write().routes_closed = false;
    }

    pub fn routes_open(&self) -> bool {
        !self.read().routes_closed
    }

    /// Slash-corrected path recorded by the last unmatched dispatch
    pub fn pending_redirect(&self) -> Option<String> {
        self.read().pending_redirect.clone()
    }

    /// Take the pending redirect, clearing it
    pub fn take_redirect(&self) -> Option<String> {
        self.write().pending_redirect.take()
    }

    /// Route a request through the pending path hooks
    ///
    /// Candidates are tried in priority order. The first match is removed
    /// from the registry and its target runs with `router` as the object,
    /// the path as argument 0 and the captures as named arguments. A target
    /// returning null or `false` declines; the next candidate is tried.
    pub fn dispatch_path(&self, router: &mut dyn Hookable, request: &PathRequest) -> PathDispatch {
        let config = self.config();
        let candidates: Vec<(Arc<HookRecord>, Arc<PathPattern>)> = {
            let mut state = self.write();
            state.pending_redirect = None;
            state
                .statics
                .get(&config.path_hook_class)
                .and_then(|pool| pool.get(&config.path_hook_method))
                .map(|hooks| {
                    hooks
                        .values()
                        .filter_map(|record| {
                            state
                                .path_hooks
                                .get(&record.id)
                                .map(|pattern| (Arc::clone(record), Arc::clone(pattern)))
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut redirect: Option<String> = None;
        for (record, pattern) in candidates {
            let named = match pattern.try_match(request) {
                PathMatch::Matched(named) => named,
                PathMatch::Redirect(target) => {
                    tracing::trace!("[PathHooks] {} wants {}", pattern.pattern(), target);
                    redirect.get_or_insert(target);
                    continue;
                }
                PathMatch::NoMatch => continue,
            };

            // Already claimed by a re-entrant dispatch
            if !self.remove_hook(&record.id) {
                continue;
            }

            let outcome = self.run_resolved(
                router,
                &config.path_hook_method,
                vec![Value::from(request.path.as_str())],
                &named,
                &[Arc::clone(&record)],
                Phases {
                    before: true,
                    after: true,
                    real: false,
                },
            );

            if outcome.return_value.is_truthy() {
                tracing::info!("[PathHooks] {} claimed {}", pattern.pattern(), request.path);
                return PathDispatch {
                    handled: true,
                    return_value: outcome.return_value,
                    pattern: Some(pattern.pattern().to_string()),
                    captures: named,
                    redirect: None,
                };
            }
            tracing::debug!("[PathHooks] {} declined {}", pattern.pattern(), request.path);
        }

        if let Some(target) = &redirect {
            tracing::debug!("[PathHooks] Redirect {} -> {}", request.path, target);
            self.write().pending_redirect = Some(target.clone());
        }
        PathDispatch {
            redirect,
            ..Default::default()
        }
    }
}
