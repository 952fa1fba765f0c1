//! Build status reporting.
//!
//! Gogs has no commit status API, so failed builds are reported as issues
//! on the source repository. Successful builds leave no trace.

use gogs_api::{GogsError, Issue};
use tracing::{debug, info, warn};

use crate::connector::GogsConnector;
use crate::source::GogsScmSource;

pub const MESSAGE_UNSTABLE: &str = "This commit has test failures";
pub const MESSAGE_FAILURE: &str = "This commit cannot be built";
pub const MESSAGE_OTHER: &str = "Something is wrong with the build of this commit";

/// Outcome of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    Aborted,
    NotBuilt,
}

/// Commit state reported in the issue title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Pending,
    Success,
    Error,
    Failure,
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::Failure => "FAILURE",
        })
    }
}

/// State and message for `result`; `None` when nothing is reported.
///
/// `result` is `None` while the build is still running.
#[must_use]
pub fn commit_state(result: Option<BuildResult>) -> Option<(CommitState, &'static str)> {
    match result? {
        BuildResult::Success => None,
        BuildResult::Unstable => Some((CommitState::Failure, MESSAGE_UNSTABLE)),
        BuildResult::Failure => Some((CommitState::Failure, MESSAGE_FAILURE)),
        BuildResult::Aborted | BuildResult::NotBuilt => Some((CommitState::Error, MESSAGE_OTHER)),
    }
}

/// A build to report.
#[derive(Debug, Clone)]
pub struct BuildEvent {
    /// Commit hash the build ran on.
    pub revision: String,
    pub result: Option<BuildResult>,
    /// Absolute URL of the build.
    pub build_url: String,
    /// Name of the job, usually the branch.
    pub job_name: String,
}

/// Issue describing a broken commit.
#[must_use]
pub fn build_issue(
    revision: &str,
    state: CommitState,
    build_url: &str,
    message: &str,
    job_name: &str,
    build_failure_label_id: i64,
) -> Issue {
    let short: String = revision.chars().take(7).collect();
    Issue {
        title: format!("BUILD {state} for commit: {short} branch: {job_name}"),
        body: format!("Commit: {revision}<br>{message}<br>Build URL: {build_url}"),
        assignee: None,
        labels: (build_failure_label_id > 0).then(|| vec![build_failure_label_id]),
    }
}

/// Report `event` for `source`, creating an issue when the build broke.
///
/// Failures are logged and never returned; a reporting problem must not
/// fail the build.
pub async fn notify_build_status(
    connector: &GogsConnector,
    source: &GogsScmSource,
    event: &BuildEvent,
) {
    if let Err(e) = try_notify(connector, source, event).await {
        if e.is_not_found() {
            warn!(
                repository = %source.full_name(),
                "Could not update commit status, check that the scan credentials can access the repository"
            );
        } else {
            warn!(repository = %source.full_name(), error = %e, "Could not update commit status");
        }
    }
}

async fn try_notify(
    connector: &GogsConnector,
    source: &GogsScmSource,
    event: &BuildEvent,
) -> Result<(), GogsError> {
    let client = connector.for_source(source)?;
    let Some(repository) = client.get_repository().await? else {
        debug!(repository = %source.full_name(), "Repository not found, skipping status");
        return Ok(());
    };

    let Some((state, message)) = commit_state(event.result) else {
        return Ok(());
    };

    debug!(
        url = repository.html_url.as_deref().unwrap_or_default(),
        revision = %event.revision,
        state = %state,
        "Reporting build status"
    );
    let issue = build_issue(
        &event.revision,
        state,
        &event.build_url,
        message,
        &event.job_name,
        source.build_failure_label_id(),
    );
    info!(title = %issue.title, "Creating issue");
    client.create_issue(&issue).await
}
