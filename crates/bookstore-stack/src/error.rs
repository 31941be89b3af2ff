//! # Resource Errors
//!
//! Failures raised by the resource library: invalid configurations rejected by
//! a kind's constructor, and routing conflicts raised while an effect wires the
//! API, including route ids another resource already holds. The engine boxes them into `CompositionError::Construction` or
//! `CompositionError::Effect`, which adds the scope and definition name.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("Invalid {kind} configuration, field '{field}': {reason}")]
    InvalidConfig {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("Route '{path}' is already defined")]
    DuplicateRoute { path: String },

    #[error("Method {verb} is already defined on '{path}'")]
    DuplicateMethod { verb: String, path: String },

    #[error("Unsupported HTTP method '{0}'")]
    UnsupportedMethod(String),

    #[error("Invalid path part '{0}'")]
    InvalidPathPart(String),

    #[error("Identifier '{id}' is not available: {reason}")]
    IdentifierTaken { id: String, reason: String },
}

impl ResourceError {
    pub(crate) fn invalid(kind: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        ResourceError::InvalidConfig {
            kind,
            field,
            reason: reason.into(),
        }
    }
}
