//! Error types for the registry, dispatch, and configuration layers.

use thiserror::Error;

/// Errors raised while building or querying the tool registry.
///
/// `DuplicateTool` and `InvalidDescriptor` can only occur during the
/// construction step and are fatal at startup; the lookup variants are
/// per-call and map onto `ExecutionResult::NotFound` at the dispatch
/// boundary.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown toolset: {id}")]
    UnknownToolset { id: String },

    #[error("Unknown tool '{name}' in toolset '{toolset}'")]
    UnknownTool { toolset: String, name: String },

    #[error("Duplicate tool '{name}' in toolset '{toolset}'")]
    DuplicateTool { toolset: String, name: String },

    #[error("Invalid descriptor for tool '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },
}

/// Error type returned by tool handlers.
///
/// Normalized into `ExecutionResult::ExecutionFailed` at the dispatch
/// boundary; never escapes to callers raw.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl HandlerError {
    /// Shorthand for a plain-message handler failure.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Configuration errors. All variants are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid rate-limit category '{key}': {reason}")]
    InvalidCategory { key: String, reason: String },
}
