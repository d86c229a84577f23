use std::sync::{Arc, Mutex};

use hookwire::hooks::{
    HookEvent, HookFilter, HookKind, HookOptions, HookOutcome, HookSpec, HookTarget, InvocationMode, PathRequest,
    Registry, ValueCondition,
};
use hookwire::{ClassInfo, HookId, Hookable, ObjectHandle, ObjectId, Value};

struct Calculator {
    id: ObjectId,
    real_calls: usize,
}

impl Calculator {
    fn new() -> Self {
        Self {
            id: ObjectId::new(),
            real_calls: 0,
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
        matches!(name, "___add" | "___label")
    }

    fn call_hookable(&mut self, name: &str, args: &[Value]) -> Value {
        self.real_calls += 1;
        match name {
            "___add" => Value::Int(args.first().and_then(Value::as_i64).unwrap_or(0) + 10),
            "___label" => Value::from(format!("label:{}", args.first().cloned().unwrap_or_default())),
            _ => Value::Null,
        }
    }

    fn property(&self, name: &str) -> Option<Value> {
        (name == "mode").then(|| Value::from("basic"))
    }
}

struct Router {
    id: ObjectId,
}

impl Hookable for Router {
    fn class_name(&self) -> &str {
        "PathRouter"
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

fn registry() -> Registry {
    let registry = Registry::new();
    registry
        .classes()
        .declare(ClassInfo::new("Calculator").extends("Wire").implements("Arithmetic"));
    registry
}

/// Hook that records its tag in `log` and changes nothing
fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> HookTarget {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    HookTarget::function(move |event: &mut HookEvent| {
        log.lock().unwrap().push(format!("{}:{}", event.phase, tag));
        HookOutcome::none()
    })
}

#[test]
fn test_worked_example() {
    let registry = registry();

    registry
        .add_hook_before(
            "Calculator::add",
            HookTarget::function(|event: &mut HookEvent| {
                let x = event.argument(0).as_i64().unwrap_or(0);
                event.set_argument(0, x + 1);
                HookOutcome::none()
            }),
            HookOptions::new().with_priority(50),
        )
        .unwrap();
    registry
        .add_hook_after(
            "Calculator::add",
            HookTarget::function(|event: &mut HookEvent| {
                HookOutcome::value(event.return_value().as_i64().unwrap_or(0) * 2)
            }),
            HookOptions::new(),
        )
        .unwrap();

    let mut calc = Calculator::new();
    let outcome = registry.call(&mut calc, "add", vec![Value::Int(5)]);

    assert_eq!(outcome.arguments, vec![Value::Int(6)]);
    assert_eq!(outcome.return_value, Value::Int(32));
    assert_eq!(outcome.hooks_run, 2);
    assert_eq!(calc.real_calls, 1);
}

#[test]
fn test_priority_ordering_both_phases() {
    let registry = registry();
    let log = Arc::new(Mutex::new(Vec::new()));

    for (priority, tag) in [(300, "p3"), (100, "p1"), (200, "p2")] {
        registry
            .add_hook(
                "Calculator::add",
                recorder(&log, tag),
                HookOptions::new().both().with_priority(priority),
            )
            .unwrap();
    }

    let mut calc = Calculator::new();
    registry.call(&mut calc, "add", vec![Value::Int(1)]);

    assert_eq!(
        *log.lock().unwrap(),
        vec!["before:p1", "before:p2", "before:p3", "after:p1", "after:p2", "after:p3"]
    );
}

#[test]
fn test_collision_determinism() {
    let registry = registry();
    let log = Arc::new(Mutex::new(Vec::new()));

    let ids: Vec<HookId> = ["a", "b", "c"]
        .iter()
        .flat_map(|tag| {
            registry
                .add_hook("Calculator::add", recorder(&log, tag), HookOptions::new())
                .unwrap()
        })
        .collect();
    let keys: Vec<String> = ids.iter().map(|id| id.priority.to_string()).collect();
    assert_eq!(keys, vec!["100.0", "100.1", "100.2"]);

    let mut calc = Calculator::new();
    registry.call(&mut calc, "add", vec![]);
    let first = log.lock().unwrap().clone();
    log.lock().unwrap().clear();
    registry.call(&mut calc, "add", vec![]);
    let second = log.lock().unwrap().clone();

    assert_eq!(first, vec!["after:a", "after:b", "after:c"]);
    assert_eq!(first, second);
}

#[test]
fn test_fast_path_existence() {
    let registry = registry();
    assert!(!registry.is_hooked("Calculator::add"));

    let ids = registry
        .add_hook("Calculator::add", HookTarget::function(|_e: &mut HookEvent| HookOutcome::none()), HookOptions::new())
        .unwrap();
    assert!(registry.is_hooked("Calculator::add"));

    registry.remove_hooks(&ids);
    assert!(!registry.is_hooked("Calculator::add"));
}

#[test]
fn test_after_hook_return_condition_sees_new_value() {
    let registry = registry();
    registry
        .add_hook(
            "Calculator::add",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::value(100)),
            HookOptions::new().with_priority(10),
        )
        .unwrap();
    registry
        .add_hook(
            "Calculator::add:(=100)",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::value("saw 100")),
            HookOptions::new().with_priority(20),
        )
        .unwrap();

    let mut calc = Calculator::new();
    let outcome = registry.call(&mut calc, "add", vec![Value::Int(1)]);
    assert_eq!(outcome.return_value, Value::from("saw 100"));
    assert_eq!(outcome.hooks_run, 2);
}

#[test]
fn test_replace_semantics() {
    let registry = registry();
    registry
        .add_hook_before(
            "Calculator::add",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::replace("X")),
            HookOptions::new(),
        )
        .unwrap();

    let mut calc = Calculator::new();
    let outcome = registry.call(&mut calc, "add", vec![Value::Int(5)]);
    assert_eq!(outcome.return_value, Value::from("X"));
    assert_eq!(calc.real_calls, 0);
}

#[test]
fn test_conditional_skip() {
    let registry = registry();
    registry
        .add_hook(
            "Calculator::label(foo)",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::value("hooked")),
            HookOptions::new(),
        )
        .unwrap();

    let mut calc = Calculator::new();
    let bar = registry.call(&mut calc, "label", vec![Value::from("bar")]);
    assert_eq!(bar.hooks_run, 0);
    assert_eq!(bar.return_value, Value::from("label:bar"));

    let foo = registry.call(&mut calc, "label", vec![Value::from("foo")]);
    assert_eq!(foo.hooks_run, 1);
    assert_eq!(foo.return_value, Value::from("hooked"));
}

#[test]
fn test_object_and_type_conditions() {
    let registry = registry();
    let mut calc = Calculator::new();
    let mut other = Calculator::new();

    registry
        .register(
            None,
            HookSpec::method("add")
                .class("Arithmetic")
                .object_instance(calc.id)
                .argument(0, ValueCondition::instance_of(["Page"])),
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::value("page")),
            &HookOptions::new(),
        )
        .unwrap();
    registry.classes().declare(ClassInfo::new("Page").extends("Wire"));

    let page = Value::Object(ObjectHandle::new("Page", ObjectId::new()));
    assert_eq!(registry.call(&mut calc, "add", vec![page.clone()]).return_value, Value::from("page"));
    assert_eq!(registry.call(&mut other, "add", vec![page]).hooks_run, 0);
    assert_eq!(registry.call(&mut calc, "add", vec![Value::Int(1)]).return_value, Value::Int(11));

    registry
        .add_hook(
            "Calculator(mode=basic)::label",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::value("basic")),
            HookOptions::new(),
        )
        .unwrap();
    assert_eq!(registry.call(&mut other, "label", vec![]).return_value, Value::from("basic"));
}

#[test]
fn test_local_hooks_and_introspection() {
    let registry = registry();
    let mut calc = Calculator::new();
    let mut other = Calculator::new();

    registry
        .add_hook_on(
            &calc,
            "add",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::value(0)),
            HookOptions::new(),
        )
        .unwrap();
    registry
        .add_hook(
            "Wire::add",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::none()),
            HookOptions::new().before(),
        )
        .unwrap();

    assert_eq!(registry.call(&mut calc, "add", vec![]).return_value, Value::Int(0));
    assert_eq!(registry.call(&mut other, "add", vec![]).return_value, Value::Int(10));

    let hooks = registry.get_hooks(&calc, Some("add"), HookFilter::All);
    assert_eq!(hooks.len(), 2);
    assert_eq!(registry.get_hooks(&other, None, HookFilter::All).len(), 1);
    assert_eq!(registry.get_hooks(&calc, None, HookFilter::Local).len(), 1);

    registry.forget_object(calc.id);
    assert_eq!(registry.call(&mut calc, "add", vec![]).return_value, Value::Int(10));
}

#[test]
fn test_property_hooks() {
    let registry = registry();
    registry
        .add_hook(
            "Calculator::precision",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::value(2)),
            HookOptions::new().with_kind(HookKind::Property),
        )
        .unwrap();

    let mut calc = Calculator::new();
    assert_eq!(registry.get_property(&mut calc, "precision").return_value, Value::Int(2));
    let either = registry.run_hooks(&mut calc, "precision", vec![], InvocationMode::Either);
    assert_eq!(either.hooks_run, 1);
}

#[test]
fn test_path_hook_single_shot() {
    let registry = Registry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    registry
        .add_hook(
            "/foo/{id}/",
            HookTarget::function(move |event: &mut HookEvent| {
                let id = event.named("id").cloned().unwrap_or_default();
                sink.lock().unwrap().push(id.to_string());
                HookOutcome::value(true)
            }),
            HookOptions::new(),
        )
        .unwrap();

    let mut router = Router { id: ObjectId::new() };
    let first = registry.dispatch_path(&mut router, &PathRequest::new("/foo/42/"));
    assert!(first.handled);
    assert_eq!(first.captures.get("id"), Some(&Value::from("42")));
    assert_eq!(registry.hook_count(), 0);

    let second = registry.dispatch_path(&mut router, &PathRequest::new("/foo/42/"));
    assert!(!second.handled);
    assert_eq!(*seen.lock().unwrap(), vec!["42"]);
}

#[test]
fn test_slash_redirect() {
    let registry = Registry::new();
    registry
        .add_hook(
            "/foo/bar/",
            HookTarget::function(|_e: &mut HookEvent| HookOutcome::value(true)),
            HookOptions::new(),
        )
        .unwrap();

    let mut router = Router { id: ObjectId::new() };
    let routed = registry.dispatch_path(&mut router, &PathRequest::new("/foo/bar"));
    assert!(!routed.handled);
    assert_eq!(routed.redirect.as_deref(), Some("/foo/bar/"));
    assert_eq!(registry.pending_redirect().as_deref(), Some("/foo/bar/"));
}

#[test]
fn test_dump_json_lists_everything() {
    let registry = registry();
    let calc = Calculator::new();
    registry
        .add_hook_on(&calc, "add", HookTarget::function(|_e: &mut HookEvent| HookOutcome::none()), HookOptions::new())
        .unwrap();
    registry
        .add_hook("/foo/", HookTarget::function(|_e: &mut HookEvent| HookOutcome::none()), HookOptions::new())
        .unwrap();

    let dump: serde_json::Value = serde_json::from_str(&registry.dump_json().unwrap()).unwrap();
    let entries = dump.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e["path"] == "/foo/"));
    assert!(entries.iter().any(|e| e["scope"] == "local"));
}
