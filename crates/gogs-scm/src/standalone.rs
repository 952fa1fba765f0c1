//! File-backed host for running the service on its own.
//!
//! Source containers are read from a YAML file:
//!
//! ```yaml
//! owners:
//!   - id: platform
//!     sources:
//!       - repo_owner: acme
//!         repository: api
//!         includes: "main release/*"
//!         auto_register_hook: true
//!       - kind: git
//!         id: legacy-mirror
//! ```
//!
//! Re-indexing runs branch discovery in the background and logs the heads.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::connector::GogsConnector;
use crate::discovery::{ScmHead, ScmRevision};
use crate::error::ConfigError;
use crate::host::{HostSource, SourceOwner, SourceOwners, GOGS_SOURCE_KIND};
use crate::pattern::DEFAULT_INCLUDES;
use crate::source::{GogsScmSource, DEFAULT_SSH_PORT};

/// Top level of the sources file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub owners: Vec<OwnerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerSpec {
    pub id: String,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Overrides the configured server for this source.
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub repo_owner: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_includes")]
    pub includes: String,
    #[serde(default)]
    pub excludes: String,
    #[serde(default)]
    pub auto_register_hook: bool,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: i32,
    #[serde(default)]
    pub build_failure_label_id: i64,
}

fn default_kind() -> String {
    GOGS_SOURCE_KIND.to_string()
}

fn default_includes() -> String {
    DEFAULT_INCLUDES.to_string()
}

fn default_ssh_port() -> i32 {
    DEFAULT_SSH_PORT
}

impl SourceSpec {
    fn into_host_source(self, config: &Config) -> Result<HostSource, ConfigError> {
        if self.kind != GOGS_SOURCE_KIND {
            return Ok(HostSource::Other {
                id: self.id.unwrap_or_default(),
                kind: self.kind,
            });
        }

        let server_url = self.server_url.as_deref().unwrap_or(&config.server_url);
        let mut source = GogsScmSource::new(server_url, &self.repo_owner, &self.repository)?
            .with_credentials(config.credentials.clone())
            .with_patterns(&self.includes, &self.excludes)?
            .with_auto_register_hook(self.auto_register_hook)
            .with_ssh_port(self.ssh_port)
            .with_build_failure_label_id(self.build_failure_label_id);
        if let Some(id) = self.id {
            source = source.with_id(id);
        }
        Ok(HostSource::Gogs(source))
    }
}

/// A container read from the sources file.
pub struct StaticOwner {
    id: String,
    sources: Vec<HostSource>,
    connector: GogsConnector,
    shutdown: CancellationToken,
}

impl StaticOwner {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        sources: Vec<HostSource>,
        connector: GogsConnector,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id: id.into(),
            sources,
            connector,
            shutdown,
        }
    }
}

impl SourceOwner for StaticOwner {
    fn id(&self) -> &str {
        &self.id
    }

    fn sources(&self) -> Vec<HostSource> {
        self.sources.clone()
    }

    fn reindex(&self, source: &GogsScmSource) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(container = %self.id, "No runtime available, skipping re-index");
            return;
        };

        let container = self.id.clone();
        let source = source.clone();
        let connector = self.connector.clone();
        let cancel = self.shutdown.child_token();

        runtime.spawn(async move {
            let mut heads: Vec<(ScmHead, ScmRevision)> = Vec::new();
            match source.retrieve(&connector, None, &mut heads, &cancel).await {
                Ok(stats) => {
                    for (head, revision) in &heads {
                        info!(
                            container = %container,
                            repository = %source.full_name(),
                            branch = %head.name,
                            hash = %revision.hash,
                            "Discovered head"
                        );
                    }
                    info!(
                        container = %container,
                        repository = %source.full_name(),
                        emitted = stats.emitted,
                        "Re-index finished"
                    );
                }
                Err(e) => warn!(
                    container = %container,
                    repository = %source.full_name(),
                    error = %e,
                    "Re-index failed"
                ),
            }
        });
    }
}

/// Every container of the sources file.
#[derive(Clone, Default)]
pub struct StaticSourceOwners {
    owners: Vec<Arc<StaticOwner>>,
}

impl StaticSourceOwners {
    /// Read and validate the sources file at `path`.
    pub fn load(
        path: &Path,
        config: &Config,
        shutdown: &CancellationToken,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Sources(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&content, config, shutdown)
    }

    /// Parse a sources document. Every source is validated up front.
    pub fn from_yaml(
        content: &str,
        config: &Config,
        shutdown: &CancellationToken,
    ) -> Result<Self, ConfigError> {
        let file: SourcesFile =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Sources(e.to_string()))?;
        let connector = GogsConnector::new(config.client_options());

        let owners = file
            .owners
            .into_iter()
            .map(|owner| {
                let sources = owner
                    .sources
                    .into_iter()
                    .map(|spec| spec.into_host_source(config))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::new(StaticOwner::new(
                    owner.id,
                    sources,
                    connector.clone(),
                    shutdown.clone(),
                )))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        info!(owners = owners.len(), "Loaded source owners");
        Ok(Self { owners })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl SourceOwners for StaticSourceOwners {
    fn all(&self) -> Vec<Arc<dyn SourceOwner>> {
        self.owners
            .iter()
            .map(|owner| Arc::clone(owner) as Arc<dyn SourceOwner>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::gogs_sources;

    const SOURCES: &str = r#"
owners:
  - id: platform
    sources:
      - repo_owner: acme
        repository: api
        includes: "main release/*"
        excludes: "release/old*"
        auto_register_hook: true
        build_failure_label_id: 4
      - kind: git
        id: legacy-mirror
  - id: tools
    sources:
      - id: cli-source
        server_url: "http://other.gogs:3000/"
        repo_owner: acme
        repository: cli
        ssh_port: 2222
"#;

    #[test]
    fn test_parse_sources_file() {
        let config = Config::default();
        let owners =
            StaticSourceOwners::from_yaml(SOURCES, &config, &CancellationToken::new()).unwrap();
        assert_eq!(owners.len(), 2);

        let all = owners.all();
        assert_eq!(all[0].id(), "platform");
        let sources = all[0].sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].kind(), "git");

        let gogs = gogs_sources(all[0].as_ref());
        assert_eq!(gogs.len(), 1);
        let api = &gogs[0];
        assert_eq!(api.server_url(), config.server_url);
        assert!(api.is_auto_register_hook());
        assert_eq!(api.build_failure_label_id(), 4);
        assert!(api.is_excluded("release/old-2"));
        assert!(!api.is_excluded("release/2"));

        let cli = &gogs_sources(all[1].as_ref())[0];
        assert_eq!(cli.id(), "cli-source");
        assert_eq!(cli.server_url(), "http://other.gogs:3000");
        assert_eq!(cli.ssh_port(), 2222);
        assert_eq!(cli.includes(), "*");
    }

    #[test]
    fn test_empty_document() {
        let owners =
            StaticSourceOwners::from_yaml("owners: []", &Config::default(), &CancellationToken::new())
                .unwrap();
        assert!(owners.is_empty());
    }

    #[test]
    fn test_gogs_source_requires_owner() {
        let err = StaticSourceOwners::from_yaml(
            "owners:\n  - id: x\n    sources:\n      - repository: api\n",
            &Config::default(),
            &CancellationToken::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::MissingOwner));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let err = StaticSourceOwners::from_yaml(
            "owners: [",
            &Config::default(),
            &CancellationToken::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::Sources(_)));
    }
}
