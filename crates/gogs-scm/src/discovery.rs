//! Branch discovery.
//!
//! Lists the branches of one repository, filters them through the source's
//! include/exclude wildcards and optional caller criteria, and reports each
//! surviving branch with its tip revision to an observer.

use async_trait::async_trait;
use gogs_api::{GogsClient, GogsError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;
use crate::pattern::BranchFilter;

/// Returned by [`Probe::last_modified`] when the time is unknown.
pub const UNKNOWN_LAST_MODIFIED: i64 = 0;

/// A discovered branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScmHead {
    pub name: String,
}

impl ScmHead {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A branch pinned to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScmRevision {
    pub head: ScmHead,
    pub hash: String,
}

impl ScmRevision {
    #[must_use]
    pub fn new(head: ScmHead, hash: impl Into<String>) -> Self {
        Self {
            head,
            hash: hash.into(),
        }
    }
}

/// View of one branch offered to [`Criteria`].
#[async_trait]
pub trait Probe: Send + Sync {
    /// Branch name.
    fn name(&self) -> &str;

    /// Last modification time, [`UNKNOWN_LAST_MODIFIED`] when unavailable.
    fn last_modified(&self) -> i64 {
        UNKNOWN_LAST_MODIFIED
    }

    /// Whether `path` exists at the branch tip.
    async fn exists(&self, path: &str) -> bool;
}

/// Decides whether a branch qualifies as a head.
#[async_trait]
pub trait Criteria: Send + Sync {
    async fn is_head(&self, probe: &dyn Probe) -> Result<bool, GogsError>;
}

/// Receives accepted heads in discovery order.
pub trait DiscoveryObserver: Send {
    fn observe(&mut self, head: ScmHead, revision: ScmRevision);
}

impl DiscoveryObserver for Vec<(ScmHead, ScmRevision)> {
    fn observe(&mut self, head: ScmHead, revision: ScmRevision) {
        self.push((head, revision));
    }
}

/// Probe answering from the remote repository.
pub struct BranchProbe<'a> {
    client: &'a GogsClient,
    branch: &'a str,
}

impl<'a> BranchProbe<'a> {
    #[must_use]
    pub fn new(client: &'a GogsClient, branch: &'a str) -> Self {
        Self { client, branch }
    }
}

#[async_trait]
impl<'a> Probe for BranchProbe<'a> {
    fn name(&self) -> &str {
        self.branch
    }

    async fn exists(&self, path: &str) -> bool {
        let exists = self.client.check_path_exists(self.branch, path).await;
        if !exists {
            info!(branch = %self.branch, path = %path, "Path does not exist in this branch");
        }
        exists
    }
}

/// Accepts branches containing a marker file, such as a build script.
#[derive(Debug, Clone)]
pub struct PathExistsCriteria {
    path: String,
}

impl PathExistsCriteria {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Criteria for PathExistsCriteria {
    async fn is_head(&self, probe: &dyn Probe) -> Result<bool, GogsError> {
        Ok(probe.exists(&self.path).await)
    }
}

/// Counters for one discovery run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Branches returned by the server.
    pub examined: usize,
    /// Rejected by the include/exclude wildcards.
    pub excluded: usize,
    /// Rejected by criteria, or whose criteria evaluation failed.
    pub rejected: usize,
    /// Accepted but without a commit to report.
    pub empty: usize,
    /// Reported to the observer.
    pub emitted: usize,
}

/// Discover the branches of the repository bound to `client`.
///
/// `cancel` is checked before listing and between branches; a fired token
/// ends the run with [`DiscoveryError::Cancelled`]. A failure evaluating one
/// branch is logged and does not stop the others.
pub async fn discover_branches(
    client: &GogsClient,
    filter: &BranchFilter,
    criteria: Option<&dyn Criteria>,
    observer: &mut dyn DiscoveryObserver,
    cancel: &CancellationToken,
) -> Result<DiscoveryStats, DiscoveryError> {
    let full_name = format!(
        "{}/{}",
        client.owner(),
        client.repository_name().unwrap_or_default()
    );
    info!(repository = %full_name, "Looking up branches");

    if cancel.is_cancelled() {
        return Err(DiscoveryError::Cancelled);
    }

    let branches = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
        result = client.get_branches() => result?,
    };

    let mut stats = DiscoveryStats::default();

    for branch in branches {
        if cancel.is_cancelled() {
            info!(repository = %full_name, "Branch discovery interrupted");
            return Err(DiscoveryError::Cancelled);
        }

        stats.examined += 1;
        debug!(branch = %branch.name, repository = %full_name, "Checking branch");

        if filter.is_excluded(&branch.name) {
            stats.excluded += 1;
            continue;
        }

        if let Some(criteria) = criteria {
            let probe = BranchProbe::new(client, &branch.name);
            match criteria.is_head(&probe).await {
                Ok(true) => debug!(branch = %branch.name, "Met criteria"),
                Ok(false) => {
                    debug!(branch = %branch.name, "Does not meet criteria");
                    stats.rejected += 1;
                    continue;
                }
                Err(e) => {
                    warn!(branch = %branch.name, error = %e, "Failed to evaluate branch, skipping");
                    stats.rejected += 1;
                    continue;
                }
            }
        }

        let Some(hash) = branch.hash() else {
            warn!(branch = %branch.name, repository = %full_name, "Branch has no commit");
            stats.empty += 1;
            continue;
        };

        let head = ScmHead::new(branch.name.as_str());
        let revision = ScmRevision::new(head.clone(), hash);
        observer.observe(head, revision);
        stats.emitted += 1;
    }

    info!(
        repository = %full_name,
        examined = stats.examined,
        emitted = stats.emitted,
        "Branch discovery finished"
    );
    Ok(stats)
}
