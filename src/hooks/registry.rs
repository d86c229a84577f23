//! Hook Registry
//!
//! Contains:
//! - `Registry` - stores hooks and dispatches calls through them
//! - `HookFilter` - which pools introspection looks at
//!
//! Hooks live in two pools:
//! - the local pool, keyed by object instance
//! - the static pool, keyed by declaring class; a static hook applies to
//!   every instance whose lineage contains that class
//!
//! Each pool maps `method -> priority key -> record`. Two existence caches
//! ("is this member hooked by anyone", "is this member hooked on this
//! class") let [`Registry::lookup`] answer "nothing to do" without touching
//! the pools, which matters because every hookable call asks.
//!
//! The registry is an explicit object: create one, share it (`Arc`) with
//! whatever dispatches calls. Internally a reader-writer lock guards the
//! pools; dispatch only holds the read lock while resolving hooks, never
//! while running them, so hooks may add or remove hooks re-entrantly.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::conditions::HookConditions;
use super::path::PathPattern;
use super::priority::{self, PriorityKey};
use super::record::{HookId, HookIds, HookInfo, HookRecord, HookScope};
use super::spec::HookSpec;
use super::target::HookTarget;
use super::types::{HookKind, HookOptions};
use crate::config::EngineConfig;
use crate::core::{ClassTable, HookError, HookResult, Hookable, ObjectId};
use crate::selector::{SelectorMatcher, SimpleSelector};

pub(super) type HookPool = BTreeMap<PriorityKey, Arc<HookRecord>>;
type MethodPool = HashMap<String, HookPool>;

/// Which pools introspection looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookFilter {
    #[default]
    All,
    Local,
    Static,
}

impl HookFilter {
    fn accepts(self, scope: &HookScope) -> bool {
        match self {
            HookFilter::All => true,
            HookFilter::Local => scope.is_local(),
            HookFilter::Static => !scope.is_local(),
        }
    }
}

/// Hooked member names, split by kind
#[derive(Debug, Default)]
struct MemberCache {
    methods: HashSet<String>,
    properties: HashSet<String>,
}

impl MemberCache {
    fn contains(&self, name: &str, kind: HookKind) -> bool {
        match kind {
            HookKind::Method => self.methods.contains(name),
            HookKind::Property => self.properties.contains(name),
            HookKind::Either => self.methods.contains(name) || self.properties.contains(name),
        }
    }

    fn insert(&mut self, name: &str, kind: HookKind) {
        if kind != HookKind::Property {
            self.methods.insert(name.to_string());
        }
        if kind != HookKind::Method {
            self.properties.insert(name.to_string());
        }
    }

    /// Recompute `name` from the records that remain
    fn refresh<'a, I>(&mut self, name: &str, remaining: I)
    where
        I: IntoIterator<Item = &'a Arc<HookRecord>>,
    {
        self.methods.remove(name);
        self.properties.remove(name);
        for record in remaining {
            self.insert(name, record.kind);
        }
    }

    fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.properties.is_empty()
    }
}

/// Mutable registry state, guarded by one lock
#[derive(Default)]
pub(super) struct RegistryState {
    locals: HashMap<ObjectId, MethodPool>,
    pub(super) statics: HashMap<String, MethodPool>,
    hooked: MemberCache,
    class_hooked: HashMap<String, MemberCache>,
    pub(super) path_hooks: HashMap<HookId, Arc<PathPattern>>,
    pub(super) pending_redirect: Option<String>,
    pub(super) routes_closed: bool,
}

impl RegistryState {
    fn pool(&self, scope: &HookScope) -> Option<&MethodPool> {
        match scope {
            HookScope::Local(object) => self.locals.get(object),
            HookScope::Static(class) => self.statics.get(class),
        }
    }

    fn pool_mut(&mut self, scope: &HookScope) -> &mut MethodPool {
        match scope {
            HookScope::Local(object) => self.locals.entry(*object).or_default(),
            HookScope::Static(class) => self.statics.entry(class.clone()).or_default(),
        }
    }

    /// Rebuild both caches for `method` after a removal
    fn refresh_caches(&mut self, method: &str, scope: &HookScope) {
        if let HookScope::Static(class) = scope {
            let remaining: Vec<Arc<HookRecord>> = self
                .statics
                .get(class)
                .and_then(|pool| pool.get(method))
                .map(|hooks| hooks.values().cloned().collect())
                .unwrap_or_default();
            if let Some(cache) = self.class_hooked.get_mut(class) {
                cache.refresh(method, &remaining);
                if cache.is_empty() {
                    self.class_hooked.remove(class);
                }
            }
        }

        let remaining: Vec<Arc<HookRecord>> = self
            .locals
            .values()
            .chain(self.statics.values())
            .filter_map(|pool| pool.get(method))
            .flat_map(|hooks| hooks.values().cloned())
            .collect();
        self.hooked.refresh(method, &remaining);
    }
}

/// A new record, before it has a key
pub(super) struct NewHook {
    pub scope: HookScope,
    pub method: String,
    pub kind: HookKind,
    pub target: HookTarget,
    pub run_before: bool,
    pub run_after: bool,
    pub priority: Option<PriorityKey>,
    pub conditions: HookConditions,
    pub data: Option<crate::core::Value>,
    pub path: Option<Arc<PathPattern>>,
}

/// A checked registration waiting to be stored
enum Pending {
    Method(HookSpec, HookScope),
    Path(Arc<PathPattern>),
}

/// Central registry for all hooks
///
/// # Example
///
/// ```ignore
/// let registry = Registry::new();
///
/// // Double whatever Calculator::add returns
/// registry.add_hook_after(
///     "Calculator::add",
///     HookTarget::function(|event: &mut HookEvent| {
///         let doubled = event.return_value().as_i64().unwrap_or(0) * 2;
///         HookOutcome::value(doubled)
///     }),
///     HookOptions::new(),
/// )?;
///
/// let outcome = registry.call(&mut calculator, "add", vec![Value::Int(5)]);
/// ```
pub struct Registry {
    config: EngineConfig,
    classes: ClassTable,
    selectors: Arc<dyn SelectorMatcher>,
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Create a registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a registry with a configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            classes: ClassTable::new(),
            selectors: Arc::new(SimpleSelector),
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Use a different selector engine for object, argument and return conditions
    pub fn with_selectors(mut self, selectors: Arc<dyn SelectorMatcher>) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Class hierarchy used for static hook lookup and type conditions
    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn selectors(&self) -> &dyn SelectorMatcher {
        self.selectors.as_ref()
    }

    pub(super) fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Add a class-wide hook (`Class::method`) or a path hook (`/path/`)
    ///
    /// The spec may list several methods separated by commas; one hook is
    /// registered per method and all ids are returned.
    pub fn add_hook(
        &self,
        spec: &str,
        target: HookTarget,
        options: HookOptions,
    ) -> HookResult<HookIds> {
        self.add_many(None, &[spec], target, &options)
    }

    /// Add a hook through an object
    ///
    /// Specs without a class are local to `object`; specs naming a class
    /// (`Page::render`) are class-wide, as with [`Registry::add_hook`].
    pub fn add_hook_on(
        &self,
        object: &dyn Hookable,
        spec: &str,
        target: HookTarget,
        options: HookOptions,
    ) -> HookResult<HookIds> {
        self.add_many(Some(object), &[spec], target, &options)
    }

    /// [`Registry::add_hook`] for a list of specs
    ///
    /// Every entry is checked before anything is registered, so one bad
    /// entry registers nothing. Ids come back in input order.
    pub fn add_hooks<S: AsRef<str>>(
        &self,
        specs: &[S],
        target: HookTarget,
        options: HookOptions,
    ) -> HookResult<HookIds> {
        self.add_many(None, specs, target, &options)
    }

    /// [`Registry::add_hook_on`] for a list of specs
    pub fn add_hooks_on<S: AsRef<str>>(
        &self,
        object: &dyn Hookable,
        specs: &[S],
        target: HookTarget,
        options: HookOptions,
    ) -> HookResult<HookIds> {
        self.add_many(Some(object), specs, target, &options)
    }

    /// [`Registry::add_hook`] running before the real implementation
    pub fn add_hook_before(
        &self,
        spec: &str,
        target: HookTarget,
        options: HookOptions,
    ) -> HookResult<HookIds> {
        self.add_hook(spec, target, options.before())
    }

    /// [`Registry::add_hook`] running after the real implementation
    pub fn add_hook_after(
        &self,
        spec: &str,
        target: HookTarget,
        options: HookOptions,
    ) -> HookResult<HookIds> {
        self.add_hook(spec, target, options.after())
    }

    /// [`Registry::add_hook_on`] running before the real implementation
    pub fn add_hook_before_on(
        &self,
        object: &dyn Hookable,
        spec: &str,
        target: HookTarget,
        options: HookOptions,
    ) -> HookResult<HookIds> {
        self.add_hook_on(object, spec, target, options.before())
    }

    /// [`Registry::add_hook_on`] running after the real implementation
    pub fn add_hook_after_on(
        &self,
        object: &dyn Hookable,
        spec: &str,
        target: HookTarget,
        options: HookOptions,
    ) -> HookResult<HookIds> {
        self.add_hook_on(object, spec, target, options.after())
    }

    fn add_many<S: AsRef<str>>(
        &self,
        owner: Option<&dyn Hookable>,
        specs: &[S],
        target: HookTarget,
        options: &HookOptions,
    ) -> HookResult<HookIds> {
        if specs.is_empty() {
            return Err(HookError::invalid_spec("", "no hooks given"));
        }

        // Check everything first so a bad entry registers nothing
        let mut pending = Vec::new();
        for spec in specs {
            let spec = spec.as_ref();
            if self.config.is_path_spec(spec) {
                pending.push(Pending::Path(self.compile_path(spec)?));
                continue;
            }
            for parsed in HookSpec::parse_many(spec)? {
                let scope = self.validate(owner, &parsed, options)?;
                pending.push(Pending::Method(parsed, scope));
            }
        }

        let ids = pending
            .into_iter()
            .map(|entry| match entry {
                Pending::Method(spec, scope) => self.insert(new_hook(scope, spec, target.clone(), options)),
                Pending::Path(pattern) => self.insert_path(pattern, target.clone(), options),
            })
            .collect::<HookResult<Vec<_>>>()?;
        Ok(HookIds(ids))
    }

    /// Register one hook from a structured spec
    ///
    /// `owner` is the object local hooks attach to; it is ignored when the
    /// spec names a class.
    pub fn register(
        &self,
        owner: Option<&dyn Hookable>,
        spec: HookSpec,
        target: HookTarget,
        options: &HookOptions,
    ) -> HookResult<HookId> {
        let scope = self.validate(owner, &spec, options)?;
        self.insert(new_hook(scope, spec, target, options))
    }

    /// Register several structured specs sharing one target
    ///
    /// All specs are validated before any is registered.
    pub fn register_many(
        &self,
        owner: Option<&dyn Hookable>,
        specs: Vec<HookSpec>,
        target: HookTarget,
        options: &HookOptions,
    ) -> HookResult<HookIds> {
        let scopes = specs
            .iter()
            .map(|spec| self.validate(owner, spec, options))
            .collect::<HookResult<Vec<_>>>()?;

        let ids = specs
            .into_iter()
            .zip(scopes)
            .map(|(spec, scope)| self.insert(new_hook(scope, spec, target.clone(), options)))
            .collect::<HookResult<Vec<_>>>()?;
        Ok(HookIds(ids))
    }

    /// Check a registration and decide which pool it goes to
    fn validate(
        &self,
        owner: Option<&dyn Hookable>,
        spec: &HookSpec,
        options: &HookOptions,
    ) -> HookResult<HookScope> {
        if !options.run_before && !options.run_after {
            return Err(HookError::NoPhase(spec.method.clone()));
        }
        if spec.conditions.returns.is_some() && (options.run_before || !options.run_after) {
            return Err(HookError::ReturnConditionNeedsAfter(spec.method.clone()));
        }

        match (&spec.class, owner) {
            (Some(class), _) => {
                if self.classes.is_concrete_member(class, &spec.method) {
                    return Err(HookError::AmbiguousHook {
                        class: class.clone(),
                        member: spec.method.clone(),
                    });
                }
                Ok(HookScope::Static(class.clone()))
            }
            (None, Some(object)) => {
                if object.has_concrete(&spec.method)
                    || self.classes.is_concrete_member(object.class_name(), &spec.method)
                {
                    return Err(HookError::AmbiguousHook {
                        class: object.class_name().to_string(),
                        member: spec.method.clone(),
                    });
                }
                Ok(HookScope::Local(object.object_id()))
            }
            (None, None) => Err(HookError::invalid_spec(
                &spec.method,
                "class-wide hooks need Class::method; use add_hook_on for instance hooks",
            )),
        }
    }

    /// Store a validated hook under the first free priority key
    pub(super) fn insert(&self, hook: NewHook) -> HookResult<HookId> {
        let wanted = hook
            .priority
            .unwrap_or_else(|| PriorityKey::from(self.config.default_priority));

        let mut state = self.write();
        let pool = state
            .pool_mut(&hook.scope)
            .entry(hook.method.clone())
            .or_default();
        let key = priority::free_slot(pool, wanted)
            .ok_or_else(|| HookError::InvalidPriority(format!("{} (no free sub-slot)", wanted)))?;

        let id = HookId {
            scope: hook.scope.clone(),
            priority: key,
            method: hook.method.clone(),
        };
        let record = Arc::new(HookRecord {
            id: id.clone(),
            method: hook.method.clone(),
            kind: hook.kind,
            target: hook.target,
            run_before: hook.run_before,
            run_after: hook.run_after,
            conditions: hook.conditions,
            data: hook.data,
            path: hook.path.as_ref().map(|p| p.pattern().to_string()),
        });
        pool.insert(key, record);

        state.hooked.insert(&hook.method, hook.kind);
        if let HookScope::Static(class) = &hook.scope {
            state
                .class_hooked
                .entry(class.clone())
                .or_default()
                .insert(&hook.method, hook.kind);
        }
        if let Some(pattern) = hook.path {
            state.path_hooks.insert(id.clone(), pattern);
        }

        tracing::debug!(
            "[Registry] Added hook {} (before: {}, after: {}, kind: {})",
            id,
            hook.run_before,
            hook.run_after,
            hook.kind
        );
        Ok(id)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove a hook; returns whether it existed
    ///
    /// Removing an unknown id is a no-op.
    pub fn remove_hook(&self, id: &HookId) -> bool {
        let mut state = self.write();

        let removed = match &id.scope {
            HookScope::Local(object) => state.locals.get_mut(object),
            HookScope::Static(class) => state.statics.get_mut(class),
        }
        .map(|pool| {
            let removed = pool
                .get_mut(&id.method)
                .and_then(|hooks| hooks.remove(&id.priority))
                .is_some();
            if pool.get(&id.method).map(|hooks| hooks.is_empty()).unwrap_or(false) {
                pool.remove(&id.method);
            }
            removed
        })
        .unwrap_or(false);

        if let HookScope::Local(object) = &id.scope {
            if state.locals.get(object).map(|p| p.is_empty()).unwrap_or(false) {
                state.locals.remove(object);
            }
        }
        state.path_hooks.remove(id);

        if removed {
            state.refresh_caches(&id.method, &id.scope);
            tracing::debug!("[Registry] Removed hook {}", id);
        }
        removed
    }

    /// Remove several hooks
    pub fn remove_hooks(&self, ids: &[HookId]) {
        for id in ids {
            self.remove_hook(id);
        }
    }

    /// Drop every local hook of an object the host is destroying
    pub fn forget_object(&self, object: ObjectId) {
        let mut state = self.write();
        if let Some(pool) = state.locals.remove(&object) {
            let scope = HookScope::Local(object);
            for method in pool.keys() {
                state.refresh_caches(method, &scope);
            }
            tracing::debug!(
                "[Registry] Forgot object {} ({} hooked members)",
                object,
                pool.len()
            );
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Whether anyone hooks `member` with a hook of a compatible kind
    ///
    /// May report stale positives, never false negatives.
    pub fn may_be_hooked(&self, member: &str, kind: HookKind) -> bool {
        self.read().hooked.contains(member, kind)
    }

    /// Ordered hooks applying to `object.member`
    ///
    /// Local hooks and static hooks from the object's whole lineage, merged
    /// by priority. Returns immediately when the member is not hooked at all.
    pub fn lookup(&self, object: &dyn Hookable, member: &str, kind: HookKind) -> Vec<Arc<HookRecord>> {
        let state = self.read();
        if !state.hooked.contains(member, kind) {
            return Vec::new();
        }

        let local = state
            .locals
            .get(&object.object_id())
            .and_then(|pool| pool.get(member));
        let lineage = self.classes.lineage(object.class_name());
        let statics = lineage
            .iter()
            .filter(|class| {
                state
                    .class_hooked
                    .get(class.as_str())
                    .map(|cache| cache.contains(member, kind))
                    .unwrap_or(false)
            })
            .filter_map(|class| state.statics.get(class.as_str()))
            .filter_map(|pool| pool.get(member));

        // Path hooks only run through dispatch_path
        priority::merge(local, statics, |record| {
            record.path.is_none() && record.kind.applies_to(kind)
        })
    }

    /// Fast existence check
    ///
    /// Accepts `Class::member`, `member()` (method hooks only) or a bare
    /// `member` (method or property hooks). A class query also sees hooks
    /// declared on the class's ancestors and interfaces.
    pub fn is_hooked(&self, query: &str) -> bool {
        let (class, member) = match query.split_once("::") {
            Some((class, member)) => (Some(class), member),
            None => (None, query),
        };
        let (member, kind) = match member.strip_suffix("()") {
            Some(name) => (name, HookKind::Method),
            None => (member, HookKind::Either),
        };

        match class {
            None => self.may_be_hooked(member, kind),
            Some(class) => {
                let lineage = self.classes.lineage(class);
                let state = self.read();
                lineage.iter().any(|c| {
                    state
                        .class_hooked
                        .get(c.as_str())
                        .map(|cache| cache.contains(member, kind))
                        .unwrap_or(false)
                })
            }
        }
    }

    /// Whether `object.member` has any local or class-wide hook
    pub fn is_hooked_on(&self, object: &dyn Hookable, member: &str) -> bool {
        let local = self
            .read()
            .locals
            .get(&object.object_id())
            .map(|pool| pool.contains_key(member))
            .unwrap_or(false);
        local || self.is_hooked(&format!("{}::{}", object.class_name(), member))
    }

    /// Introspection: hooks applying to `object`, in execution order per member
    ///
    /// With no member, every hooked member of the object is listed, sorted
    /// by member name.
    pub fn get_hooks(
        &self,
        object: &dyn Hookable,
        member: Option<&str>,
        filter: HookFilter,
    ) -> Vec<HookInfo> {
        let members: Vec<String> = match member {
            Some(member) => vec![member.to_string()],
            None => {
                let state = self.read();
                let lineage = self.classes.lineage(object.class_name());
                let mut names: Vec<String> = state
                    .locals
                    .get(&object.object_id())
                    .into_iter()
                    .chain(lineage.iter().filter_map(|c| state.statics.get(c.as_str())))
                    .flat_map(|pool| pool.keys().cloned())
                    .collect();
                names.sort();
                names.dedup();
                names
            }
        };

        members
            .iter()
            .flat_map(|name| self.lookup(object, name, HookKind::Either))
            .filter(|record| filter.accepts(record.scope()))
            .map(|record| record.info())
            .collect()
    }

    /// Every registered hook, as pretty JSON
    pub fn dump_json(&self) -> HookResult<String> {
        let state = self.read();
        let mut infos: Vec<HookInfo> = state
            .locals
            .values()
            .chain(state.statics.values())
            .flat_map(|pool| pool.values())
            .flat_map(|hooks| hooks.values())
            .map(|record| record.info())
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(serde_json::to_string_pretty(&infos)?)
    }

    /// Total number of registered hooks
    pub fn hook_count(&self) -> usize {
        let state = self.read();
        state
            .locals
            .values()
            .chain(state.statics.values())
            .flat_map(|pool| pool.values())
            .map(|hooks| hooks.len())
            .sum()
    }

    /// Every hook of one pool for a member, in key order
    pub fn pool_hooks(&self, scope: &HookScope, member: &str) -> Vec<Arc<HookRecord>> {
        self.read()
            .pool(scope)
            .and_then(|pool| pool.get(member))
            .map(|hooks| hooks.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn new_hook(scope: HookScope, spec: HookSpec, target: HookTarget, options: &HookOptions) -> NewHook {
    NewHook {
        scope,
        method: spec.method,
        kind: options.kind,
        target,
        run_before: options.run_before,
        run_after: options.run_after,
        priority: options.priority,
        conditions: spec.conditions,
        data: options.data.clone(),
        path: None,
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Registry")
            .field("local_objects", &state.locals.len())
            .field("static_classes", &state.statics.len())
            .field("path_hooks", &state.path_hooks.len())
            .finish()
    }
}
