//! Gogs integration for a multi-branch build host.
//!
//! This crate provides:
//! - Branch discovery with include/exclude wildcards and caller criteria
//! - Organization scanning that proposes one source per repository
//! - The webhook receiver that re-indexes sources on push
//! - Ordered webhook registration and removal for auto-registering sources
//! - Build status reporting through repository issues
//! - Organization and repository decoration with re-entrancy protection
//! - A YAML-backed host for running standalone

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod connector;
pub mod decoration;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod host;
pub mod navigator;
pub mod notification;
pub mod pattern;
pub mod source;
pub mod standalone;

pub use config::Config;
pub use connector::GogsConnector;
pub use decoration::{Decoration, DecorationGuard, DecorationGuards, DecorationTarget, Decorator};
pub use discovery::{
    discover_branches, Criteria, DiscoveryObserver, DiscoveryStats, PathExistsCriteria, Probe,
    ScmHead, ScmRevision,
};
pub use error::{ConfigError, DiscoveryError};
pub use hooks::receiver::{build_router, HookReceiver, ReceiverError};
pub use hooks::registrar::{HookRegistrar, WebhookManager};
pub use hooks::{scm_source_reindex, HookEventType};
pub use host::{HostSource, SourceOwner, SourceOwners};
pub use navigator::{GogsScmNavigator, SourceObserver};
pub use notification::{notify_build_status, BuildEvent, BuildResult, CommitState};
pub use pattern::BranchFilter;
pub use source::GogsScmSource;
pub use standalone::StaticSourceOwners;
