//! Organization scanning.
//!
//! Lists the repositories of a user or organization and proposes one
//! [`GogsScmSource`] per repository whose name matches the configured pattern.

use gogs_api::{Credentials, GogsClient};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::normalize_server_url;
use crate::connector::GogsConnector;
use crate::error::{ConfigError, DiscoveryError};
use crate::source::{GogsScmSource, DEFAULT_SSH_PORT};

/// Repository name pattern matching every repository.
pub const DEFAULT_PATTERN: &str = ".*";

/// Receives proposed sources, keyed by repository name.
pub trait SourceObserver: Send {
    fn observe(&mut self, name: &str, source: GogsScmSource);
}

impl SourceObserver for Vec<GogsScmSource> {
    fn observe(&mut self, _name: &str, source: GogsScmSource) {
        self.push(source);
    }
}

/// Scans the repositories of one owner.
#[derive(Debug, Clone)]
pub struct GogsScmNavigator {
    server_url: String,
    repo_owner: String,
    credentials: Option<Credentials>,
    pattern: String,
    matcher: Regex,
    auto_register_hooks: bool,
    ssh_port: i32,
}

impl GogsScmNavigator {
    /// # Errors
    /// Fails for an invalid server URL.
    pub fn new(server_url: &str, repo_owner: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            server_url: normalize_server_url(server_url)?,
            repo_owner: repo_owner.trim().to_string(),
            credentials: None,
            pattern: DEFAULT_PATTERN.to_string(),
            matcher: compile_name_pattern(DEFAULT_PATTERN)?,
            auto_register_hooks: false,
            ssh_port: DEFAULT_SSH_PORT,
        })
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Restrict proposals to repositories whose whole name matches `pattern`.
    ///
    /// # Errors
    /// Fails if `pattern` is not a valid regular expression.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.matcher = compile_name_pattern(pattern)?;
        self.pattern = pattern.to_string();
        Ok(self)
    }

    #[must_use]
    pub fn with_auto_register_hooks(mut self, enabled: bool) -> Self {
        self.auto_register_hooks = enabled;
        self
    }

    #[must_use]
    pub fn with_ssh_port(mut self, port: i32) -> Self {
        self.ssh_port = port;
        self
    }

    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    #[must_use]
    pub fn repo_owner(&self) -> &str {
        &self.repo_owner
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn is_auto_register_hooks(&self) -> bool {
        self.auto_register_hooks
    }

    /// Whether the whole of `name` matches the pattern.
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        self.matcher.is_match(name)
    }

    /// Client for the owner, optionally bound to one repository.
    pub fn client(
        &self,
        connector: &GogsConnector,
        repository: Option<&str>,
    ) -> gogs_api::Result<GogsClient> {
        connector.connect(
            &self.server_url,
            &self.repo_owner,
            repository,
            self.credentials.clone(),
        )
    }

    /// Propose a source for every matching repository of the owner.
    ///
    /// Returns the number of sources proposed. A blank owner is logged and
    /// proposes nothing.
    pub async fn visit_sources(
        &self,
        connector: &GogsConnector,
        observer: &mut dyn SourceObserver,
        cancel: &CancellationToken,
    ) -> Result<usize, DiscoveryError> {
        if self.repo_owner.is_empty() {
            error!("Must specify a repository owner");
            return Ok(0);
        }
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        match &self.credentials {
            Some(credentials) => info!(
                server_url = %self.server_url,
                username = %credentials.username,
                "Connecting with credentials"
            ),
            None => info!(server_url = %self.server_url, "Connecting with no credentials, anonymous access"),
        }

        let client = self.client(connector, None)?;
        match client.get_organization().await {
            Ok(Some(_)) => {
                info!(owner = %self.repo_owner, "Looking up repositories of organization");
            }
            Ok(None) => info!(owner = %self.repo_owner, "Looking up repositories of user"),
            Err(e) => warn!(
                owner = %self.repo_owner,
                status = e.status(),
                error = %e,
                "Organization lookup failed, listing repositories anyway"
            ),
        }

        let repositories = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            result = client.get_repositories() => result?,
        };

        let mut proposed = 0;
        for repository in repositories {
            let Some(name) = repository.repository_name() else {
                continue;
            };
            if !self.accepts(name) {
                info!(repository = %name, "Ignoring");
                continue;
            }
            if cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }
            info!(repository = %name, "Proposing");
            observer.observe(name, self.source_for(name)?);
            proposed += 1;
        }
        Ok(proposed)
    }

    fn source_for(&self, repository: &str) -> Result<GogsScmSource, ConfigError> {
        Ok(GogsScmSource::new(&self.server_url, &self.repo_owner, repository)?
            .with_credentials(self.credentials.clone())
            .with_auto_register_hook(self.auto_register_hooks)
            .with_ssh_port(self.ssh_port))
    }
}

fn compile_name_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
