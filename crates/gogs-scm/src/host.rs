//! Collaborators supplied by the hosting build system.
//!
//! The host owns source containers ("owners"), each holding a list of
//! configured sources of any kind. This crate only acts on the Gogs ones.

use std::sync::Arc;

use crate::source::GogsScmSource;

/// Source kind tag used for Gogs sources in the host's configuration.
pub const GOGS_SOURCE_KIND: &str = "gogs";

/// A source as registered with the host.
#[derive(Debug, Clone)]
pub enum HostSource {
    Gogs(GogsScmSource),
    /// A source of another SCM kind, ignored here.
    Other { kind: String, id: String },
}

impl HostSource {
    #[must_use]
    pub fn as_gogs(&self) -> Option<&GogsScmSource> {
        match self {
            Self::Gogs(source) => Some(source),
            Self::Other { .. } => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Gogs(_) => GOGS_SOURCE_KIND,
            Self::Other { kind, .. } => kind,
        }
    }
}

/// A container of sources, such as a multi-branch project.
pub trait SourceOwner: Send + Sync {
    /// Stable identity of the container.
    fn id(&self) -> &str;

    /// Sources currently configured on this container.
    fn sources(&self) -> Vec<HostSource>;

    /// Ask the host to re-run discovery for `source`.
    ///
    /// Must not block on the discovery itself.
    fn reindex(&self, source: &GogsScmSource);
}

/// Registry of every source container known to the host.
pub trait SourceOwners: Send + Sync {
    /// All containers, regardless of the caller's permissions.
    ///
    /// Webhook callers carry no identity, so implementations must
    /// enumerate with system-level visibility.
    fn all(&self) -> Vec<Arc<dyn SourceOwner>>;
}

/// Gogs sources of `owner`, in configuration order.
#[must_use]
pub fn gogs_sources(owner: &dyn SourceOwner) -> Vec<GogsScmSource> {
    owner
        .sources()
        .into_iter()
        .filter_map(|source| match source {
            HostSource::Gogs(source) => Some(source),
            HostSource::Other { .. } => None,
        })
        .collect()
}
