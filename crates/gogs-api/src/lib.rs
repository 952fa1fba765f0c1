//! Gogs REST API client and webhook payload types.
//!
//! This crate provides:
//! - [`GogsClient`], an owner/repository scoped client for `/api/v1`
//! - Entity types mirroring the JSON the server returns
//! - Push payload decoding for inbound webhooks
//! - [`GogsError`], carrying status code and raw body for failed requests

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod models;
pub mod payload;

pub use client::{ClientOptions, Credentials, GogsClient, ProxyConfig};
pub use error::{GogsError, Result};
pub use models::{
    Branch, Commit, HookConfig, Issue, Organization, Repository, RepositoryOwner, WebHook,
};
pub use payload::{push_event_from_payload, PushEvent};
