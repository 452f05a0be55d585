//! Error types for the OCCI engine

use thiserror::Error;

/// Errors surfaced by the model, store and dispatch layers
///
/// None of these are retried inside the engine; handlers and callers decide
/// what to do with them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Attribute map failed Kind/Mixin schema validation
    #[error("schema validation failed for '{attribute}': {reason}")]
    SchemaValidation { attribute: String, reason: String },

    /// Unknown type identifier, location or entity identifier
    #[error("not found: {0}")]
    NotFound(String),

    /// Action name absent for the resolved type
    #[error("action '{action}' not supported by {type_identifier}")]
    ActionNotSupported {
        type_identifier: String,
        action: String,
    },

    /// Unregister attempted while the category is still referenced
    #[error("category {0} is still in use")]
    CategoryInUse(String),

    /// Register with unresolved `related` edges, or a malformed category
    #[error("invalid category {type_identifier}: {reason}")]
    DuplicateOrInvalidCategory {
        type_identifier: String,
        reason: String,
    },

    /// Action invoked without a required parameter
    #[error("missing parameter '{0}'")]
    MissingParameter(String),

    /// No queue publisher attached to the engine
    #[error("no delegate configured for remote action forwarding")]
    NoDelegateConfigured,

    /// Opaque pass-through from the external IaaS provider
    #[error("provider error: {0}")]
    Provider(String),

    /// Collection store I/O or consistency failure
    #[error("store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Queue publish error
    #[error("publish error: {0}")]
    Publish(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Store(err.to_string())
    }
}
