//! Hook targets
//!
//! Contains:
//! - `Hook` trait - for implementing hooks (closures implement it)
//! - `HookHandler` - an object that handles hooks by member name
//! - `HookTarget` - what a registration points at

use std::fmt;
use std::sync::{Arc, Weak};

use super::types::{HookEvent, HookOutcome};

/// Trait for hook implementations
///
/// Hooks run inline on the caller's thread, in priority order.
pub trait Hook: Send + Sync {
    /// Execute the hook with the given event
    fn call(&self, event: &mut HookEvent<'_>) -> HookOutcome;
}

/// Implement Hook for closures
///
/// Uses Higher-Ranked Trait Bounds (HRTB) so the closure works with any
/// lifetime of HookEvent.
impl<F> Hook for F
where
    F: for<'a> Fn(&mut HookEvent<'a>) -> HookOutcome + Send + Sync,
{
    fn call(&self, event: &mut HookEvent<'_>) -> HookOutcome {
        (self)(event)
    }
}

/// Type alias for stored hooks
pub type ArcHook = Arc<dyn Hook>;

/// An object whose members can be hook targets
///
/// Registered through [`HookTarget::method`]. The registry keeps only a weak
/// reference; the owner stays responsible for the object's lifetime.
pub trait HookHandler: Send + Sync {
    /// Run `member` for this event
    ///
    /// Return `None` when `member` is not something this handler can call;
    /// the hook is then skipped and not counted as run.
    fn handle_hook(&self, member: &str, event: &mut HookEvent<'_>) -> Option<HookOutcome>;
}

/// What a hook registration calls
#[derive(Clone)]
pub enum HookTarget {
    /// Free function or closure
    Function(ArcHook),
    /// A member of a handler object, held weakly
    Method {
        handler: Weak<dyn HookHandler>,
        member: String,
    },
}

impl HookTarget {
    /// Target a closure or other [`Hook`]
    pub fn function<H: Hook + 'static>(hook: H) -> Self {
        HookTarget::Function(Arc::new(hook))
    }

    /// Target a member of a handler object without keeping it alive
    pub fn method<H: HookHandler + 'static>(handler: &Arc<H>, member: impl Into<String>) -> Self {
        let weak: Weak<H> = Arc::downgrade(handler);
        HookTarget::Method {
            handler: weak,
            member: member.into(),
        }
    }

    /// Invoke the target; `None` if it is no longer callable
    pub fn invoke(&self, event: &mut HookEvent<'_>) -> Option<HookOutcome> {
        match self {
            HookTarget::Function(hook) => Some(hook.call(event)),
            HookTarget::Method { handler, member } => {
                let handler = handler.upgrade()?;
                handler.handle_hook(member, event)
            }
        }
    }

    /// Short description for introspection
    pub fn describe(&self) -> String {
        match self {
            HookTarget::Function(_) => "function".to_string(),
            HookTarget::Method { handler, member } => {
                if handler.strong_count() > 0 {
                    format!("method {}", member)
                } else {
                    format!("method {} (dropped)", member)
                }
            }
        }
    }
}

impl fmt::Debug for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
