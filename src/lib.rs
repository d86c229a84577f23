pub mod core;
pub mod config;
pub mod logging;

// Selector language used by hook conditions
pub mod selector;

// Hook registry, dispatch and path hooks
pub mod hooks;

pub use crate::config::{EngineConfig, LoggingConfig};
pub use crate::core::{ClassInfo, ClassTable, HookError, HookResult, Hookable, ObjectHandle, ObjectId, Value};
pub use crate::hooks::{
    DispatchOutcome, HookEvent, HookId, HookOptions, HookOutcome, HookSpec, HookTarget, PathRequest, Registry,
};
