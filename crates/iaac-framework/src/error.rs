//! # Composition Errors
//!
//! Every failure the engine can report while joining builders, running effects
//! or synthesizing a stack. Failures are fatal: nothing is retried, and a failed
//! construction leaves no memo entry behind so a corrected run starts clean.

/// Boxed error returned by definitions, constructors, effect callbacks and renderers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the framework.
pub type Result<T, E = CompositionError> = std::result::Result<T, E>;

/// Errors that can occur while composing or synthesizing a stack.
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("Definition '{name}' failed: {source}")]
    Definition {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Construction of '{name}' in scope '{scope}' failed: {source}")]
    Construction {
        scope: String,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Effect over [{}] failed: {source}", .names.join(", "))]
    Effect {
        names: Vec<String>,
        #[source]
        source: BoxError,
    },

    #[error("Identifier '{id}' requested by '{requested}' is already taken by '{existing}'")]
    IdentifierCollision {
        id: String,
        existing: String,
        requested: String,
    },

    #[error("Name '{name}' does not yield a usable identifier")]
    InvalidIdentifier { name: String },

    #[error("Memo entry for '{name}' holds an unexpected type")]
    MemoType { name: String },

    #[error("Rendering '{id}' failed: {source}")]
    Render {
        id: String,
        #[source]
        source: BoxError,
    },

    #[error("Stack '{stack}' is tainted by a failed effect")]
    Tainted { stack: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
