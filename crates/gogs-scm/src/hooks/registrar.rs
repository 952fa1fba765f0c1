//! Keeps remote webhooks in sync with the configured sources.
//!
//! Lifecycle events of source containers are queued to a single worker
//! task, so registrations and removals run one at a time in the order the
//! events were observed.

use std::sync::Arc;

use gogs_api::{GogsClient, Result as GogsResult, WebHook};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{HookEventType, HOOK_TYPE};
use crate::connector::GogsConnector;
use crate::host::{gogs_sources, SourceOwner, SourceOwners};
use crate::source::GogsScmSource;

/// Registers and removes the receiver's webhook on source repositories.
#[derive(Clone)]
pub struct WebhookManager {
    connector: GogsConnector,
    owners: Arc<dyn SourceOwners>,
    hook_url: Option<String>,
}

impl WebhookManager {
    /// `hook_url` is the public receiver URL; without it nothing is registered.
    #[must_use]
    pub fn new(
        connector: GogsConnector,
        owners: Arc<dyn SourceOwners>,
        hook_url: Option<String>,
    ) -> Self {
        Self {
            connector,
            owners,
            hook_url,
        }
    }

    #[must_use]
    pub fn hook_url(&self) -> Option<&str> {
        self.hook_url.as_deref()
    }

    /// The webhook this service registers.
    #[must_use]
    pub fn desired_hook(hook_url: &str) -> WebHook {
        WebHook::new(HOOK_TYPE, hook_url, HookEventType::registration_events())
    }

    /// Ensure every auto-registering source of `owner` has a hook pointing here.
    pub async fn register_hooks(&self, owner: &dyn SourceOwner) {
        for source in gogs_sources(owner) {
            if !source.is_auto_register_hook() {
                continue;
            }
            if let Err(e) = self.register_source_hook(&source).await {
                error!(
                    repository = %source.full_name(),
                    status = e.status(),
                    error = %e,
                    "Failed to register webhook"
                );
            }
        }
    }

    /// Remove this service's hook from the auto-registering sources of
    /// `owner`, unless another container still uses the same repository.
    pub async fn remove_hooks(&self, owner: &dyn SourceOwner) {
        for source in gogs_sources(owner) {
            if !source.is_auto_register_hook() {
                continue;
            }
            if let Err(e) = self.remove_source_hook(owner, &source).await {
                error!(
                    repository = %source.full_name(),
                    status = e.status(),
                    error = %e,
                    "Failed to remove webhook"
                );
            }
        }
    }

    /// Whether a container other than `owner` has a Gogs source for
    /// `repo_owner/repository`.
    #[must_use]
    pub fn is_used_somewhere_else(
        &self,
        owner: &dyn SourceOwner,
        repo_owner: &str,
        repository: &str,
    ) -> bool {
        self.owners
            .all()
            .iter()
            .filter(|other| other.id() != owner.id())
            .any(|other| {
                gogs_sources(other.as_ref())
                    .iter()
                    .any(|s| s.targets(repo_owner, repository))
            })
    }

    async fn register_source_hook(&self, source: &GogsScmSource) -> GogsResult<()> {
        let client = self.connector.for_source(source)?;
        let existing = find_hook(&client, self.hook_url.as_deref()).await?;
        if existing.is_some() {
            debug!(repository = %source.full_name(), "Webhook already registered");
            return Ok(());
        }

        let Some(hook_url) = &self.hook_url else {
            warn!(
                repository = %source.full_name(),
                "Can not register hook, root URL is not configured"
            );
            return Ok(());
        };

        info!(repository = %source.full_name(), "Registering hook");
        let created = client
            .register_commit_web_hook(&Self::desired_hook(hook_url))
            .await?;
        debug!(repository = %source.full_name(), hook_id = ?created.id, "Hook registered");
        Ok(())
    }

    async fn remove_source_hook(
        &self,
        owner: &dyn SourceOwner,
        source: &GogsScmSource,
    ) -> GogsResult<()> {
        let client = self.connector.for_source(source)?;
        let hook = find_hook(&client, self.hook_url.as_deref()).await?;

        match hook {
            Some(hook)
                if !self.is_used_somewhere_else(owner, source.repo_owner(), source.repository()) =>
            {
                info!(repository = %source.full_name(), "Removing hook");
                client.remove_commit_web_hook(&hook).await
            }
            _ => {
                debug!(
                    repository = %source.full_name(),
                    "Not removing hook because it does not exist or is used by another container"
                );
                Ok(())
            }
        }
    }
}

/// The repository hook targeting `hook_url`, if any.
async fn find_hook(client: &GogsClient, hook_url: Option<&str>) -> GogsResult<Option<WebHook>> {
    let Some(hook_url) = hook_url else {
        return Ok(None);
    };
    Ok(client
        .get_web_hooks()
        .await?
        .into_iter()
        .find(|hook| hook.targets(hook_url)))
}

enum HookTask {
    Register(Arc<dyn SourceOwner>),
    Remove(Arc<dyn SourceOwner>),
    Flush(oneshot::Sender<()>),
}

/// Ordered queue of webhook registrations and removals.
///
/// Cloning shares the same queue. The worker stops once every handle is
/// dropped and the queue is drained.
#[derive(Clone)]
pub struct HookRegistrar {
    tx: mpsc::UnboundedSender<HookTask>,
}

impl HookRegistrar {
    /// Start the worker on the current runtime.
    #[must_use]
    pub fn spawn(manager: WebhookManager) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<HookTask>();

        let handle = tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                match task {
                    HookTask::Register(owner) => {
                        debug!(container = %owner.id(), "Processing hook registration");
                        manager.register_hooks(owner.as_ref()).await;
                    }
                    HookTask::Remove(owner) => {
                        debug!(container = %owner.id(), "Processing hook removal");
                        manager.remove_hooks(owner.as_ref()).await;
                    }
                    HookTask::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Hook registrar stopped");
        });

        (Self { tx }, handle)
    }

    /// A container was created.
    pub fn on_created(&self, owner: Arc<dyn SourceOwner>) {
        self.submit(HookTask::Register(owner));
    }

    /// A container's configuration changed.
    pub fn on_updated(&self, owner: Arc<dyn SourceOwner>) {
        self.submit(HookTask::Register(owner));
    }

    /// A container was deleted. `owner` is its last known configuration.
    pub fn on_deleted(&self, owner: Arc<dyn SourceOwner>) {
        self.submit(HookTask::Remove(owner));
    }

    /// Wait until every task submitted before this call has completed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(HookTask::Flush(done_tx));
        let _ = done_rx.await;
    }

    fn submit(&self, task: HookTask) {
        if self.tx.send(task).is_err() {
            warn!("Hook registrar is not running, dropping task");
        }
    }
}
