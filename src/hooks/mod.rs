//! Hooks Module
//!
//! Intercept hookable methods and properties of host objects.
//!
//! # Overview
//!
//! Hooks let you:
//! - Run code before or after a method, or in place of it
//! - Rewrite call arguments and return values
//! - Provide methods and properties a class does not implement
//! - Restrict a hook to one instance, to objects matching a selector, or to
//!   calls whose arguments or return value match a condition
//! - Claim request paths with single-shot route hooks
//!
//! # Example
//!
//! ```ignore
//! use hookwire::hooks::{HookEvent, HookOptions, HookOutcome, HookTarget, Registry};
//!
//! let registry = Registry::new();
//!
//! // Raise the first argument before Calculator::add runs
//! registry.add_hook_before(
//!     "Calculator::add",
//!     HookTarget::function(|event: &mut HookEvent| {
//!         let x = event.argument(0).as_i64().unwrap_or(0);
//!         event.set_argument(0, x + 1);
//!         HookOutcome::none()
//!     }),
//!     HookOptions::new().with_priority(50),
//! )?;
//!
//! // Only when the result is large
//! registry.add_hook("Calculator::add:(>100)", log_big_results, HookOptions::new())?;
//!
//! let outcome = registry.call(&mut calculator, "add", vec![Value::Int(5)]);
//! ```
//!
//! # Call sequence
//!
//! | Step | What happens |
//! |------|--------------|
//! | resolve | local and class-wide hooks merged by priority |
//! | before | before hooks, in order; may rewrite arguments, replace or cancel |
//! | real | `___member` on the object, unless replaced |
//! | after | after hooks, in order; may rewrite the return value or cancel |
//!
//! Lower priority runs first. The default is 100.

mod conditions;
mod dispatch;
mod path;
mod priority;
mod record;
mod registry;
mod spec;
mod target;
mod types;

pub use conditions::{ConditionContext, HookConditions, ObjectCondition, ValueCondition};
pub use dispatch::{DispatchOutcome, InvocationMode};
pub use path::{PathDispatch, PathMatch, PathPattern, PathRequest};
pub use priority::PriorityKey;
pub use record::{HookId, HookIds, HookInfo, HookRecord, HookScope};
pub use registry::{HookFilter, Registry};
pub use spec::HookSpec;
pub use target::{ArcHook, Hook, HookHandler, HookTarget};
pub use types::{HookEvent, HookKind, HookOptions, HookOutcome, HookPhase};
