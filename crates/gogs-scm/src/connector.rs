//! Builds API clients for sources and owners.

use gogs_api::{ClientOptions, Credentials, GogsClient, Result};

use crate::source::GogsScmSource;

/// Factory for [`GogsClient`]s sharing the same transport options.
#[derive(Debug, Clone, Default)]
pub struct GogsConnector {
    options: ClientOptions,
}

impl GogsConnector {
    #[must_use]
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    /// Client scoped to `owner` and, optionally, one of its repositories.
    pub fn connect(
        &self,
        server_url: &str,
        owner: &str,
        repository: Option<&str>,
        credentials: Option<Credentials>,
    ) -> Result<GogsClient> {
        GogsClient::with_options(server_url, owner, repository, credentials, &self.options)
    }

    /// Client bound to the repository of `source`, using its scan credentials.
    pub fn for_source(&self, source: &GogsScmSource) -> Result<GogsClient> {
        self.connect(
            source.server_url(),
            source.repo_owner(),
            Some(source.repository()),
            source.credentials().cloned(),
        )
    }
}
