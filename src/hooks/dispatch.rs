//! Call dispatch
//!
//! Runs one hookable call: before hooks, the real implementation, after
//! hooks. Hooks are resolved once per call under the registry's read lock
//! and run with no lock held.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::conditions::ConditionContext;
use super::record::HookRecord;
use super::registry::Registry;
use super::types::{HookEvent, HookKind, HookOutcome, HookPhase};
use crate::core::{Hookable, Value};

/// How a call is dispatched
#[derive(Debug, Clone, Default)]
pub enum InvocationMode {
    /// Method call: method hooks, then the real implementation
    #[default]
    Method,
    /// Property read: property hooks only, never the real implementation
    Property,
    /// Method or property hooks, then the real implementation
    Either,
    /// Only before hooks, no real implementation
    BeforeOnly,
    /// Only after hooks, no real implementation
    AfterOnly,
    /// Exactly these hooks, in this order
    Explicit(Vec<Arc<HookRecord>>),
}

impl InvocationMode {
    fn kind(&self) -> HookKind {
        match self {
            InvocationMode::Property => HookKind::Property,
            InvocationMode::Either => HookKind::Either,
            _ => HookKind::Method,
        }
    }

    pub(super) fn phases(&self) -> Phases {
        match self {
            InvocationMode::Method | InvocationMode::Either | InvocationMode::Explicit(_) => Phases {
                before: true,
                after: true,
                real: true,
            },
            InvocationMode::Property => Phases {
                before: true,
                after: true,
                real: false,
            },
            InvocationMode::BeforeOnly => Phases {
                before: true,
                after: false,
                real: false,
            },
            InvocationMode::AfterOnly => Phases {
                before: false,
                after: true,
                real: false,
            },
        }
    }
}

/// Which parts of a call run
#[derive(Debug, Clone, Copy)]
pub(super) struct Phases {
    pub before: bool,
    pub after: bool,
    pub real: bool,
}

/// What happened during one dispatched call
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Final return value
    pub return_value: Value,
    /// Arguments as the last hook left them
    pub arguments: Vec<Value>,
    /// Hooks whose target was actually invoked
    pub hooks_run: usize,
    /// Whether a real implementation was found
    pub method_exists: bool,
    /// A before hook replaced the real implementation
    pub replaced: bool,
    /// A hook stopped the remaining hooks
    pub cancelled: bool,
}

impl DispatchOutcome {
    /// Neither a real implementation nor any hook handled the call
    ///
    /// Hosts typically report an unknown-method error in this case.
    pub fn not_run(&self) -> bool {
        !self.method_exists && self.hooks_run == 0
    }
}

/// Mutable state of one call
struct CallContext {
    arguments: Vec<Value>,
    return_value: Value,
    hooks_run: usize,
    replaced: bool,
    cancelled: bool,
}

impl CallContext {
    fn new(arguments: Vec<Value>) -> Self {
        Self {
            arguments,
            return_value: Value::Null,
            hooks_run: 0,
            replaced: false,
            cancelled: false,
        }
    }

    fn apply(&mut self, phase: HookPhase, outcome: HookOutcome) {
        if let Some(value) = outcome.value {
            self.return_value = value;
        }
        if outcome.replace && phase == HookPhase::Before {
            self.replaced = true;
        }
        if outcome.cancel {
            self.cancelled = true;
        }
    }

    fn finish(self, method_exists: bool) -> DispatchOutcome {
        DispatchOutcome {
            return_value: self.return_value,
            arguments: self.arguments,
            hooks_run: self.hooks_run,
            method_exists,
            replaced: self.replaced,
            cancelled: self.cancelled,
        }
    }
}

impl Registry {
    /// Call a hookable method through its hooks
    pub fn call(&self, object: &mut dyn Hookable, method: &str, arguments: Vec<Value>) -> DispatchOutcome {
        self.run_hooks(object, method, arguments, InvocationMode::Method)
    }

    /// Read a hookable property through its hooks
    pub fn get_property(&self, object: &mut dyn Hookable, property: &str) -> DispatchOutcome {
        self.run_hooks(object, property, Vec::new(), InvocationMode::Property)
    }

    /// Dispatch one call
    ///
    /// The real implementation is found through the configured hookable
    /// prefix (`___add` for `add`). When no hooks apply, the real
    /// implementation is called directly, or the call reports
    /// [`DispatchOutcome::not_run`].
    pub fn run_hooks(
        &self,
        object: &mut dyn Hookable,
        member: &str,
        arguments: Vec<Value>,
        mode: InvocationMode,
    ) -> DispatchOutcome {
        let phases = mode.phases();
        let hooks = match mode {
            InvocationMode::Explicit(hooks) => hooks,
            other => self.lookup(&*object, member, other.kind()),
        };
        self.run_resolved(object, member, arguments, &BTreeMap::new(), &hooks, phases)
    }

    pub(super) fn run_resolved(
        &self,
        object: &mut dyn Hookable,
        member: &str,
        arguments: Vec<Value>,
        named: &BTreeMap<String, Value>,
        hooks: &[Arc<HookRecord>],
        phases: Phases,
    ) -> DispatchOutcome {
        let real_name = format!("{}{}", self.config().hookable_prefix, member);
        let method_exists = phases.real && object.has_hookable(&real_name);
        let mut ctx = CallContext::new(arguments);

        if hooks.is_empty() {
            if method_exists {
                ctx.return_value = object.call_hookable(&real_name, &ctx.arguments);
            }
            return ctx.finish(method_exists);
        }

        let conditions = ConditionContext {
            selectors: self.selectors(),
            classes: self.classes(),
        };

        if phases.before {
            for hook in hooks.iter().filter(|h| h.run_before) {
                if ctx.cancelled {
                    break;
                }
                self.run_one(hook, HookPhase::Before, object, member, named, &conditions, &mut ctx);
            }
        }

        if method_exists && !ctx.replaced {
            ctx.return_value = object.call_hookable(&real_name, &ctx.arguments);
        }

        if phases.after {
            for hook in hooks.iter().filter(|h| h.run_after) {
                if ctx.cancelled {
                    break;
                }
                self.run_one(hook, HookPhase::After, object, member, named, &conditions, &mut ctx);
            }
        }

        tracing::trace!(
            "[Dispatch] {}::{} ran {} of {} hooks",
            object.class_name(),
            member,
            ctx.hooks_run,
            hooks.len()
        );
        ctx.finish(method_exists)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_one(
        &self,
        hook: &HookRecord,
        phase: HookPhase,
        object: &mut dyn Hookable,
        member: &str,
        named: &BTreeMap<String, Value>,
        conditions: &ConditionContext<'_>,
        ctx: &mut CallContext,
    ) {
        let return_value = (phase == HookPhase::After).then_some(&ctx.return_value);
        if !hook.conditions.check(conditions, &*object, &ctx.arguments, return_value) {
            return;
        }

        let outcome = {
            let mut event = HookEvent {
                object: &mut *object,
                method: member,
                phase,
                arguments: &mut ctx.arguments,
                id: &hook.id,
                data: hook.data.as_ref(),
                registry: self,
                return_value: &ctx.return_value,
                named,
            };
            hook.target.invoke(&mut event)
        };

        match outcome {
            Some(outcome) => {
                ctx.hooks_run += 1;
                ctx.apply(phase, outcome);
            }
            None => tracing::debug!(
                "[Dispatch] Skipped hook {}: target {} is not callable",
                hook.id,
                hook.target.describe()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClassInfo, ObjectId};
    use crate::hooks::{HookHandler, HookOptions, HookTarget};

    struct Calculator {
        id: ObjectId,
        calls: usize,
    }

    impl Calculator {
        fn new() -> Self {
            Self {
                id: ObjectId::new(),
                calls: 0,
            }
        }
    }

    impl Hookable for Calculator {
        fn class_name(&self) -> &str {
            "Calculator"
        }

        fn object_id(&self) -> ObjectId {
            self.id
        }

        fn has_hookable(&self, name: &str) -> bool {
            name == "___add"
        }

        fn call_hookable(&mut self, name: &str, args: &[Value]) -> Value {
            self.calls += 1;
            match name {
                "___add" => Value::Int(args.first().and_then(Value::as_i64).unwrap_or(0) + 10),
                _ => Value::Null,
            }
        }
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.classes().declare(ClassInfo::new("Calculator"));
        registry
    }

    #[test]
    fn test_no_hooks_calls_real() {
        let registry = registry();
        let mut calc = Calculator::new();
        let outcome = registry.call(&mut calc, "add", vec![Value::Int(1)]);
        assert_eq!(outcome.return_value, Value::Int(11));
        assert!(outcome.method_exists);
        assert_eq!(outcome.hooks_run, 0);
    }

    #[test]
    fn test_unknown_member_not_run() {
        let registry = registry();
        let mut calc = Calculator::new();
        let outcome = registry.call(&mut calc, "subtract", vec![]);
        assert!(outcome.not_run());
        assert_eq!(calc.calls, 0);
    }

    #[test]
    fn test_hook_provides_missing_method() {
        let registry = registry();
        registry
            .add_hook(
                "Calculator::subtract",
                HookTarget::function(|event: &mut HookEvent| {
                    HookOutcome::value(event.argument(0).as_i64().unwrap_or(0) - 1)
                }),
                HookOptions::new(),
            )
            .unwrap();

        let mut calc = Calculator::new();
        let outcome = registry.call(&mut calc, "subtract", vec![Value::Int(5)]);
        assert!(!outcome.not_run());
        assert!(!outcome.method_exists);
        assert_eq!(outcome.return_value, Value::Int(4));
    }

    #[test]
    fn test_replace_skips_real() {
        let registry = registry();
        registry
            .add_hook_before(
                "Calculator::add",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::replace("X")),
                HookOptions::new(),
            )
            .unwrap();

        let mut calc = Calculator::new();
        let outcome = registry.call(&mut calc, "add", vec![Value::Int(1)]);
        assert_eq!(outcome.return_value, Value::from("X"));
        assert!(outcome.replaced);
        assert_eq!(calc.calls, 0);
    }

    #[test]
    fn test_before_value_without_replace_is_overwritten() {
        let registry = registry();
        registry
            .add_hook_before(
                "Calculator::add",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::value(99)),
                HookOptions::new(),
            )
            .unwrap();

        let mut calc = Calculator::new();
        let outcome = registry.call(&mut calc, "add", vec![Value::Int(1)]);
        assert_eq!(outcome.return_value, Value::Int(11));
    }

    #[test]
    fn test_cancel_stops_later_hooks() {
        let registry = registry();
        registry
            .add_hook(
                "Calculator::add",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::value(1).and_cancel()),
                HookOptions::new().with_priority(10),
            )
            .unwrap();
        registry
            .add_hook(
                "Calculator::add",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::value(2)),
                HookOptions::new().with_priority(20),
            )
            .unwrap();

        let mut calc = Calculator::new();
        let outcome = registry.call(&mut calc, "add", vec![Value::Int(1)]);
        assert_eq!(outcome.return_value, Value::Int(1));
        assert_eq!(outcome.hooks_run, 1);
        assert!(outcome.cancelled);
    }

    #[test]
    fn test_before_cancel_still_runs_real() {
        let registry = registry();
        registry
            .add_hook_before(
                "Calculator::add",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::cancel()),
                HookOptions::new().with_priority(10),
            )
            .unwrap();
        registry
            .add_hook_before(
                "Calculator::add",
                HookTarget::function(|event: &mut HookEvent| {
                    event.set_argument(0, 100);
                    HookOutcome::none()
                }),
                HookOptions::new().with_priority(20),
            )
            .unwrap();
        registry
            .add_hook(
                "Calculator::add",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::value(0)),
                HookOptions::new(),
            )
            .unwrap();

        let mut calc = Calculator::new();
        let outcome = registry.call(&mut calc, "add", vec![Value::Int(1)]);
        assert_eq!(outcome.return_value, Value::Int(11));
        assert_eq!(outcome.arguments, vec![Value::Int(1)]);
        assert_eq!(calc.calls, 1);
        assert_eq!(outcome.hooks_run, 1);
        assert!(outcome.cancelled);
        assert!(!outcome.replaced);
    }

    #[test]
    fn test_conditions_gate_hooks() {
        let registry = registry();
        registry
            .add_hook_before(
                "Calculator::add(>5)",
                HookTarget::function(|event: &mut HookEvent| {
                    event.set_argument(0, 0);
                    HookOutcome::none()
                }),
                HookOptions::new(),
            )
            .unwrap();
        registry
            .add_hook(
                "Calculator::add:(=10)",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::value("ten")),
                HookOptions::new(),
            )
            .unwrap();

        let mut calc = Calculator::new();
        let small = registry.call(&mut calc, "add", vec![Value::Int(3)]);
        assert_eq!(small.return_value, Value::Int(13));
        assert_eq!(small.hooks_run, 0);

        let large = registry.call(&mut calc, "add", vec![Value::Int(8)]);
        assert_eq!(large.arguments, vec![Value::Int(0)]);
        assert_eq!(large.return_value, Value::from("ten"));
        assert_eq!(large.hooks_run, 2);
    }

    #[test]
    fn test_property_mode() {
        let registry = registry();
        registry
            .add_hook(
                "Calculator::precision",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::value(4)),
                HookOptions::new().with_kind(HookKind::Property),
            )
            .unwrap();

        let mut calc = Calculator::new();
        let read = registry.get_property(&mut calc, "precision");
        assert_eq!(read.return_value, Value::Int(4));

        // A property hook does not answer method calls
        let call = registry.call(&mut calc, "precision", vec![]);
        assert!(call.not_run());
    }

    #[test]
    fn test_phase_only_modes() {
        let registry = registry();
        registry
            .add_hook(
                "Calculator::add",
                HookTarget::function(|event: &mut HookEvent| {
                    let phase = event.phase.to_string();
                    HookOutcome::value(phase)
                }),
                HookOptions::new().both(),
            )
            .unwrap();

        let mut calc = Calculator::new();
        let before = registry.run_hooks(&mut calc, "add", vec![], InvocationMode::BeforeOnly);
        assert_eq!(before.return_value, Value::from("before"));
        assert_eq!(before.hooks_run, 1);
        assert!(!before.method_exists);

        let after = registry.run_hooks(&mut calc, "add", vec![], InvocationMode::AfterOnly);
        assert_eq!(after.return_value, Value::from("after"));
        assert_eq!(calc.calls, 0);
    }

    #[test]
    fn test_explicit_hooks() {
        let registry = registry();
        let ids = registry
            .add_hook(
                "Calculator::add",
                HookTarget::function(|_event: &mut HookEvent| HookOutcome::value(7)),
                HookOptions::new(),
            )
            .unwrap();
        let hooks = registry.pool_hooks(&ids[0].scope, "add");

        let mut calc = Calculator::new();
        let outcome = registry.run_hooks(
            &mut calc,
            "unrelated",
            vec![],
            InvocationMode::Explicit(hooks),
        );
        assert_eq!(outcome.return_value, Value::Int(7));
    }

    struct Doubler;

    impl HookHandler for Doubler {
        fn handle_hook(&self, member: &str, event: &mut HookEvent<'_>) -> Option<HookOutcome> {
            match member {
                "double" => Some(HookOutcome::value(event.return_value().as_i64()? * 2)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_method_targets() {
        let registry = registry();
        let handler = Arc::new(Doubler);
        registry
            .add_hook("Calculator::add", HookTarget::method(&handler, "double"), HookOptions::new())
            .unwrap();
        registry
            .add_hook("Calculator::add", HookTarget::method(&handler, "missing"), HookOptions::new())
            .unwrap();

        let mut calc = Calculator::new();
        let outcome = registry.call(&mut calc, "add", vec![Value::Int(1)]);
        assert_eq!(outcome.return_value, Value::Int(22));
        assert_eq!(outcome.hooks_run, 1);

        drop(handler);
        let outcome = registry.call(&mut calc, "add", vec![Value::Int(1)]);
        assert_eq!(outcome.return_value, Value::Int(11));
        assert_eq!(outcome.hooks_run, 0);
    }

    #[test]
    fn test_hook_can_remove_itself() {
        let registry = registry();
        registry
            .add_hook(
                "Calculator::add",
                HookTarget::function(|event: &mut HookEvent| {
                    event.remove_self();
                    HookOutcome::value(0)
                }),
                HookOptions::new(),
            )
            .unwrap();

        let mut calc = Calculator::new();
        assert_eq!(registry.call(&mut calc, "add", vec![Value::Int(1)]).return_value, Value::Int(0));
        assert_eq!(registry.call(&mut calc, "add", vec![Value::Int(1)]).return_value, Value::Int(11));
        assert!(!registry.is_hooked("Calculator::add"));
    }
}
