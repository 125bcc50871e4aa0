//! Common error types for the provisioner.

use thiserror::Error;

/// Common error type for provisioner operations.
///
/// Only [`Error::Config`] is fatal to a provisioning attempt. Every other
/// variant is reported by a collection component and degrades to "this
/// evidence is absent".
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hardware manifest plugin {plugin} failed: {reason}")]
    PluginFailure { plugin: String, reason: String },

    #[error("Hardware manifest plugin {plugin} failed validation: {reason}")]
    ValidationFailure { plugin: String, reason: String },

    #[error("Missing evidence: {0}")]
    MissingEvidence(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Command execution failed: {cmd} - {reason}")]
    CommandExecution { cmd: String, reason: String },

    #[error("Command timed out: {cmd}")]
    CommandTimeout { cmd: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a plugin failure for `plugin`.
    pub fn plugin(plugin: impl Into<String>, reason: impl ToString) -> Self {
        Error::PluginFailure {
            plugin: plugin.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort the provisioning attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
