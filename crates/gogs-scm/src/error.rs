//! Error types for source configuration and discovery.

use gogs_api::GogsError;
use thiserror::Error;

/// Misconfiguration detected before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid branch pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Must specify a repository owner")]
    MissingOwner,

    #[error("Must specify a repository")]
    MissingRepository,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Failed to load sources file: {0}")]
    Sources(String),
}

/// Outcome of an aborted discovery or navigation run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The caller's cancellation token fired.
    #[error("Discovery was cancelled")]
    Cancelled,

    /// A listing call to the server failed.
    #[error(transparent)]
    Api(#[from] GogsError),

    /// A discovered repository could not be turned into a source.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DiscoveryError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
