//! Presentation metadata for organization and repository containers.
//!
//! Applying a decoration usually saves the container, and saving fires the
//! same lifecycle hook that requested the decoration. [`DecorationGuards`]
//! breaks that loop: while a container is being decorated, further
//! requests for it are skipped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use gogs_api::GogsError;
use tracing::{debug, info};

use crate::connector::GogsConnector;
use crate::navigator::GogsScmNavigator;

/// Set of containers currently being decorated.
#[derive(Debug, Clone, Default)]
pub struct DecorationGuards {
    held: Arc<Mutex<HashSet<String>>>,
}

impl DecorationGuards {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as being decorated.
    ///
    /// Returns `None` if it already is. The mark is released when the
    /// returned guard is dropped.
    #[must_use]
    pub fn acquire(&self, key: &str) -> Option<DecorationGuard> {
        let inserted = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        inserted.then(|| DecorationGuard {
            key: key.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Scoped mark on one container. Dropping it releases the mark.
#[derive(Debug)]
pub struct DecorationGuard {
    key: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl DecorationGuard {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for DecorationGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Metadata for an organization folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgDecoration {
    pub name: String,
    /// Applied only when the container has no display name of its own.
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Web page of the organization.
    pub url: String,
}

/// Metadata for a repository container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDecoration {
    pub full_name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub private: bool,
}

/// Decoration handed to a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoration {
    Org(OrgDecoration),
    Repo(RepoDecoration),
}

/// A host container that can display Gogs metadata.
pub trait DecorationTarget: Send + Sync {
    /// Identity of the container, stable across saves.
    fn key(&self) -> String;

    /// Store the decoration. May re-enter the [`Decorator`].
    fn decorate(&self, decoration: Decoration);
}

/// Fetches metadata and applies it to containers.
#[derive(Debug, Clone, Default)]
pub struct Decorator {
    connector: GogsConnector,
    guards: DecorationGuards,
}

impl Decorator {
    #[must_use]
    pub fn new(connector: GogsConnector) -> Self {
        Self {
            connector,
            guards: DecorationGuards::new(),
        }
    }

    #[must_use]
    pub fn guards(&self) -> &DecorationGuards {
        &self.guards
    }

    /// Decorate an organization folder scanned by `navigator`.
    ///
    /// Returns `false` when skipped: the target is already being decorated
    /// or the owner is not an organization.
    pub async fn apply_org(
        &self,
        target: &dyn DecorationTarget,
        navigator: &GogsScmNavigator,
    ) -> Result<bool, GogsError> {
        let key = target.key();
        let Some(_guard) = self.guards.acquire(&key) else {
            debug!(container = %key, "Already decorating, skipping");
            return Ok(false);
        };

        info!(
            server_url = %navigator.server_url(),
            owner = %navigator.repo_owner(),
            "Creating connector"
        );
        let client = navigator.client(&self.connector, None)?;
        let Some(org) = client.get_organization().await? else {
            debug!(owner = %navigator.repo_owner(), "Owner is not an organization");
            return Ok(false);
        };
        info!(organization = %org.name, "Retrieved organization");

        let url = org.html_url()?;
        target.decorate(Decoration::Org(OrgDecoration {
            name: org.name,
            display_name: org.display_name,
            description: org.description,
            url,
        }));
        Ok(true)
    }

    /// Decorate the container of `repository`, one of `navigator`'s repositories.
    ///
    /// Returns `false` when skipped: the target is already being decorated
    /// or the repository was not found.
    pub async fn apply_repo(
        &self,
        target: &dyn DecorationTarget,
        navigator: &GogsScmNavigator,
        repository: &str,
    ) -> Result<bool, GogsError> {
        let key = target.key();
        let Some(_guard) = self.guards.acquire(&key) else {
            debug!(container = %key, "Already decorating, skipping");
            return Ok(false);
        };

        let client = navigator.client(&self.connector, Some(repository))?;
        let Some(repo) = client.get_repository().await? else {
            debug!(repository = %repository, "Repository not found");
            return Ok(false);
        };

        target.decorate(Decoration::Repo(RepoDecoration {
            full_name: repo.full_name,
            description: repo.description,
            url: repo.html_url,
            private: repo.private,
        }));
        Ok(true)
    }
}
