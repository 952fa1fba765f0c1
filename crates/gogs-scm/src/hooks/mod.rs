//! Gogs webhooks: event types, the receiver endpoint and hook registration.

pub mod receiver;
pub mod registrar;

use tracing::{debug, info};

use crate::host::{gogs_sources, SourceOwners};

/// Root path segment of the receiver.
pub const HOOK_PATH: &str = "gogs-scmsource-hook";

/// Receiver path relative to the service root.
pub const FULL_PATH: &str = "gogs-scmsource-hook/notify";

/// Header carrying the event type.
pub const EVENT_HEADER: &str = "X-Gogs-Event";

/// Event type header sent by older servers.
pub const LEGACY_EVENT_HEADER: &str = "X-Event-Key";

/// Hook type tag used when registering webhooks.
pub const HOOK_TYPE: &str = "gogs";

/// Handles the payload of one event type.
pub type HookProcessor = fn(&dyn SourceOwners, &str);

/// Webhook event types this service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEventType {
    Push,
    Create,
    PullRequest,
}

impl HookEventType {
    /// Every handled type, in registration order.
    pub const ALL: [Self; 3] = [Self::Push, Self::Create, Self::PullRequest];

    /// Value of the event header for this type.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Create => "create",
            Self::PullRequest => "pull_request",
        }
    }

    /// Look up a type by header value. Matching is exact.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }

    /// Handler for payloads of this type.
    #[must_use]
    pub fn processor(self) -> HookProcessor {
        match self {
            Self::Push => process_push,
            Self::Create => process_create,
            Self::PullRequest => process_pull_request,
        }
    }

    /// Event keys sent when registering a webhook.
    #[must_use]
    pub fn registration_events() -> Vec<String> {
        Self::ALL.iter().map(|t| t.key().to_string()).collect()
    }
}

impl std::fmt::Display for HookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

fn process_push(owners: &dyn SourceOwners, payload: &str) {
    process_push_shaped(owners, HookEventType::Push, payload);
}

fn process_create(owners: &dyn SourceOwners, payload: &str) {
    process_push_shaped(owners, HookEventType::Create, payload);
}

fn process_pull_request(owners: &dyn SourceOwners, payload: &str) {
    process_push_shaped(owners, HookEventType::PullRequest, payload);
}

fn process_push_shaped(owners: &dyn SourceOwners, event: HookEventType, payload: &str) {
    let Some(push) = gogs_api::push_event_from_payload(payload) else {
        return;
    };
    info!(
        event = %event,
        owner = %push.owner(),
        repository = %push.repository_name(),
        "Received hook from Gogs"
    );
    scm_source_reindex(owners, push.owner(), push.repository_name());
}

/// Ask every container holding a Gogs source for `owner/repository` to
/// re-index it.
///
/// Returns the number of re-index requests made; zero is not an error.
pub fn scm_source_reindex(owners: &dyn SourceOwners, owner: &str, repository: &str) -> usize {
    let mut triggered = 0;
    for source_owner in owners.all() {
        for source in gogs_sources(source_owner.as_ref()) {
            if source.targets(owner, repository) {
                info!(
                    container = %source_owner.id(),
                    repository = %source.full_name(),
                    "Triggering re-index"
                );
                source_owner.reindex(&source);
                triggered += 1;
            }
        }
    }
    if triggered == 0 {
        debug!(owner = %owner, repository = %repository, "No source configured for repository");
    }
    triggered
}
