//! Gogs entity types.
//!
//! Plain snapshots of the JSON returned by `/api/v1`. Unknown fields are
//! ignored so newer server versions keep parsing.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GogsError, Result};

/// A user or organization owning repositories.
///
/// Whether the owner is an organization is resolved by
/// [`crate::GogsClient::get_organization`], not by this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    /// Numeric id, required by the repository search endpoint.
    #[serde(default)]
    pub id: Option<i64>,
    /// Login name.
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl RepositoryOwner {
    /// Display name, falling back to the login name when unset.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

/// Gogs repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/name`.
    pub full_name: String,
    #[serde(default)]
    pub owner: Option<RepositoryOwner>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(rename = "private", alias = "is_private", default)]
    pub private: bool,
}

impl Repository {
    /// Owner part of [`Self::full_name`].
    #[must_use]
    pub fn owner_name(&self) -> Option<&str> {
        self.full_name.split_once('/').map(|(owner, _)| owner)
    }

    /// Repository part of [`Self::full_name`].
    #[must_use]
    pub fn repository_name(&self) -> Option<&str> {
        self.full_name
            .split_once('/')
            .map(|(_, name)| name)
            .or(self.name.as_deref())
    }
}

/// Envelope returned by `/repos/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RepositorySearch {
    #[serde(default)]
    pub data: Vec<Repository>,
}

/// A commit as embedded in a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Content hash, the revision identity.
    #[serde(rename = "id")]
    pub hash: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// A branch of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// `None` for repositories that have no commits yet.
    #[serde(default)]
    pub commit: Option<Commit>,
}

impl Branch {
    #[must_use]
    pub fn new(name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit: Some(Commit {
                hash: hash.into(),
                message: None,
            }),
        }
    }

    /// Hash of the branch tip, if any.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.commit.as_ref().map(|c| c.hash.as_str())
    }
}

/// Gogs organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(rename = "username")]
    pub name: String,
    #[serde(rename = "full_name", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Organization {
    /// Web page of the organization.
    ///
    /// Gogs does not return one, so it is rebuilt from the avatar URL's
    /// scheme, host and port plus the organization name.
    pub fn html_url(&self) -> Result<String> {
        let avatar = self
            .avatar_url
            .as_deref()
            .ok_or_else(|| GogsError::Config(format!("organization {} has no avatar URL", self.name)))?;
        let endpoint = Url::parse(avatar)
            .map_err(|e| GogsError::Config(format!("invalid avatar URL {avatar}: {e}")))?;
        let host = endpoint
            .host_str()
            .ok_or_else(|| GogsError::Config(format!("avatar URL {avatar} has no host")))?;
        let scheme = if endpoint.scheme() == "https" {
            "https"
        } else {
            "http"
        };
        Ok(match endpoint.port() {
            Some(port) => format!("{scheme}://{host}:{port}/{}", self.name),
            None => format!("{scheme}://{host}/{}", self.name),
        })
    }
}

/// Target of a webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content_type: String,
}

/// A repository webhook.
///
/// `id` is assigned by the server on creation and is absent before
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebHook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub active: bool,
    #[serde(rename = "type", default)]
    pub hook_type: String,
    #[serde(default)]
    pub config: HookConfig,
    #[serde(default)]
    pub events: Vec<String>,
}

impl WebHook {
    /// An active JSON hook delivering `events` to `url`.
    #[must_use]
    pub fn new(hook_type: &str, url: &str, events: Vec<String>) -> Self {
        Self {
            id: None,
            active: true,
            hook_type: hook_type.to_string(),
            config: HookConfig {
                url: url.to_string(),
                content_type: "json".to_string(),
            },
            events,
        }
    }

    #[must_use]
    pub fn targets(&self, url: &str) -> bool {
        self.config.url == url
    }
}

/// An issue, used as a build-status record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<i64>>,
}
