//! Hook engine error types

use thiserror::Error;

/// Errors raised while registering hooks or loading engine configuration
///
/// Dispatch never produces these: a hook that cannot run is skipped.
#[derive(Error, Debug)]
pub enum HookError {
    /// Method spec could not be parsed into name, class filter and conditions
    #[error("Invalid hook spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// The member already exists as a concrete, non-interceptable member
    #[error("Cannot hook {class}::{member}: a concrete member with that name exists and would never be intercepted")]
    AmbiguousHook { class: String, member: String },

    /// Return condition on a hook that does not run (only) after
    #[error("Hook '{0}' has a return condition, which requires an after-only hook")]
    ReturnConditionNeedsAfter(String),

    /// Neither before nor after was requested
    #[error("Hook '{0}' must run before, after, or both")]
    NoPhase(String),

    /// Path hook registered outside the route registration window
    #[error("Path hook '{0}' registered after routing concluded")]
    RoutesClosed(String),

    /// Path pattern did not compile to a regex
    #[error("Invalid path pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Priority string not in `major[.minor]` form
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    /// Hook id string not in a recognised form
    #[error("Invalid hook id: {0}")]
    InvalidHookId(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HookError {
    /// Create a spec parse error
    pub fn invalid_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        HookError::InvalidSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for registration and configuration
pub type HookResult<T> = Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HookError::invalid_spec("Page::", "missing method name");
        assert_eq!(
            err.to_string(),
            "Invalid hook spec 'Page::': missing method name"
        );

        let err = HookError::ReturnConditionNeedsAfter("render".into());
        assert!(err.to_string().contains("after-only"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: HookError = json_err.into();
        assert!(matches!(err, HookError::Serialization(_)));
    }
}
