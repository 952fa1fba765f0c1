//! A configured Gogs repository source.

use gogs_api::{Credentials, GogsError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{normalize_server_url, parse_http_url};
use crate::connector::GogsConnector;
use crate::discovery::{
    discover_branches, Criteria, DiscoveryObserver, DiscoveryStats, ScmHead, ScmRevision,
};
use crate::error::{ConfigError, DiscoveryError};
use crate::pattern::BranchFilter;

/// Name of the git remote used for checkouts.
pub const REMOTE_NAME: &str = "origin";

/// Fetch refspecs for branches and pull request heads.
pub const REF_SPECS: [&str; 2] = [
    "+refs/heads/*:refs/remotes/origin/*",
    "+refs/pull/*/head:refs/remotes/origin/pr/*",
];

/// SSH port value meaning "use HTTPS remotes".
pub const DEFAULT_SSH_PORT: i32 = -1;

/// Binds one remote repository to discovery and build behavior.
#[derive(Debug, Clone)]
pub struct GogsScmSource {
    id: Option<String>,
    server_url: String,
    repo_owner: String,
    repository: String,
    credentials: Option<Credentials>,
    filter: BranchFilter,
    auto_register_hook: bool,
    ssh_port: i32,
    build_failure_label_id: i64,
}

impl GogsScmSource {
    /// Create a source with default patterns and no credentials.
    ///
    /// # Errors
    /// Fails for an invalid server URL or a blank owner or repository.
    pub fn new(server_url: &str, repo_owner: &str, repository: &str) -> Result<Self, ConfigError> {
        if repo_owner.trim().is_empty() {
            return Err(ConfigError::MissingOwner);
        }
        if repository.trim().is_empty() {
            return Err(ConfigError::MissingRepository);
        }
        Ok(Self {
            id: None,
            server_url: normalize_server_url(server_url)?,
            repo_owner: repo_owner.to_string(),
            repository: repository.to_string(),
            credentials: None,
            filter: BranchFilter::default(),
            auto_register_hook: false,
            ssh_port: DEFAULT_SSH_PORT,
            build_failure_label_id: 0,
        })
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Replace the include/exclude wildcards.
    ///
    /// # Errors
    /// Fails if either expression does not compile.
    pub fn with_patterns(mut self, includes: &str, excludes: &str) -> Result<Self, ConfigError> {
        self.filter = BranchFilter::new(includes, excludes)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_auto_register_hook(mut self, enabled: bool) -> Self {
        self.auto_register_hook = enabled;
        self
    }

    #[must_use]
    pub fn with_ssh_port(mut self, port: i32) -> Self {
        self.ssh_port = port;
        self
    }

    #[must_use]
    pub fn with_build_failure_label_id(mut self, label_id: i64) -> Self {
        self.build_failure_label_id = label_id;
        self
    }

    /// Identifier, falling back to `owner/repository`.
    #[must_use]
    pub fn id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.full_name())
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
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repository)
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    #[must_use]
    pub fn filter(&self) -> &BranchFilter {
        &self.filter
    }

    #[must_use]
    pub fn includes(&self) -> &str {
        self.filter.includes()
    }

    #[must_use]
    pub fn excludes(&self) -> &str {
        self.filter.excludes()
    }

    #[must_use]
    pub fn is_excluded(&self, branch: &str) -> bool {
        self.filter.is_excluded(branch)
    }

    #[must_use]
    pub fn is_auto_register_hook(&self) -> bool {
        self.auto_register_hook
    }

    #[must_use]
    pub fn ssh_port(&self) -> i32 {
        self.ssh_port
    }

    #[must_use]
    pub fn build_failure_label_id(&self) -> i64 {
        self.build_failure_label_id
    }

    /// Whether this source points at `owner/repository`.
    #[must_use]
    pub fn targets(&self, owner: &str, repository: &str) -> bool {
        self.repo_owner == owner && self.repository == repository
    }

    /// HTTPS clone URL.
    #[must_use]
    pub fn remote_url(&self) -> String {
        format!("{}/{}/{}.git", self.server_url, self.repo_owner, self.repository)
    }

    /// SSH clone URL, when an SSH port is configured.
    #[must_use]
    pub fn ssh_remote_url(&self) -> Option<String> {
        if self.ssh_port <= 0 {
            return None;
        }
        let host = parse_http_url(&self.server_url)
            .ok()?
            .host_str()?
            .to_string();
        Some(format!(
            "ssh://git@{host}:{}/{}/{}.git",
            self.ssh_port, self.repo_owner, self.repository
        ))
    }

    /// Clone URL used for checkouts: SSH when configured, HTTPS otherwise.
    #[must_use]
    pub fn checkout_url(&self) -> String {
        self.ssh_remote_url().unwrap_or_else(|| self.remote_url())
    }

    /// Discover the branches of this repository.
    pub async fn retrieve(
        &self,
        connector: &GogsConnector,
        criteria: Option<&dyn Criteria>,
        observer: &mut dyn DiscoveryObserver,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryStats, DiscoveryError> {
        match &self.credentials {
            Some(credentials) => info!(
                server_url = %self.server_url,
                username = %credentials.username,
                "Connecting with credentials"
            ),
            None => info!(server_url = %self.server_url, "Connecting with no credentials, anonymous access"),
        }
        let client = connector.for_source(self)?;
        discover_branches(&client, &self.filter, criteria, observer, cancel).await
    }

    /// Current revision of a single branch.
    ///
    /// `None` when the branch does not exist or has no commit.
    pub async fn retrieve_head(
        &self,
        connector: &GogsConnector,
        branch: &str,
    ) -> Result<Option<ScmRevision>, GogsError> {
        let client = connector.for_source(self)?;
        info!(branch = %branch, repository = %self.full_name(), "Retrieving head");

        let revision = client
            .get_branch(branch)
            .await?
            .and_then(|b| b.hash().map(|hash| ScmRevision::new(ScmHead::new(b.name.as_str()), hash)));

        if revision.is_none() {
            warn!(branch = %branch, repository = %self.full_name(), "No branch found with a commit");
        }
        Ok(revision)
    }
}
