//! REST client for the Gogs `/api/v1` endpoints.
//!
//! One client is scoped to one owner and, optionally, one repository.
//! Every call issues its own request and awaits the full response; there is
//! no retry at this layer.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::{GogsError, Result};
use crate::models::{
    Branch, Issue, Organization, Repository, RepositoryOwner, RepositorySearch, WebHook,
};

const API_BASE_PATH: &str = "/api/v1";

/// Page size used when listing the repositories of an owner.
const DEFAULT_REPOSITORY_READ_LIMIT: u32 = 1000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Basic credentials for the API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Build credentials only when both parts are non-blank.
    #[must_use]
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.trim().is_empty() => Some(Self {
                username: u.to_string(),
                password: p.to_string(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Outbound proxy settings.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Comma-separated hosts that bypass the proxy.
    pub no_proxy: Option<String>,
}

/// Transport options shared by every client built from the same settings.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub proxy: Option<ProxyConfig>,
}

/// Gogs API client.
#[derive(Debug, Clone)]
pub struct GogsClient {
    http: reqwest::Client,
    base_url: String,
    owner: String,
    repository: Option<String>,
    credentials: Option<Credentials>,
}

impl GogsClient {
    /// Create a client without proxy settings.
    ///
    /// # Errors
    /// Returns [`GogsError::Config`] if `base_url` is not a valid URL.
    pub fn new(
        base_url: &str,
        owner: &str,
        repository: Option<&str>,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        Self::with_options(
            base_url,
            owner,
            repository,
            credentials,
            &ClientOptions::default(),
        )
    }

    /// Create a client with explicit transport options.
    ///
    /// # Errors
    /// Returns [`GogsError::Config`] for an invalid base or proxy URL.
    pub fn with_options(
        base_url: &str,
        owner: &str,
        repository: Option<&str>,
        credentials: Option<Credentials>,
        options: &ClientOptions,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .user_agent(concat!("gogs-scm/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy_config) = &options.proxy {
            builder = builder.proxy(build_proxy(proxy_config)?);
        }

        let http = builder
            .build()
            .map_err(|e| GogsError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            owner: owner.to_string(),
            repository: repository.map(String::from),
            credentials,
        })
    }

    /// Repository owner (user or organization).
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repository_name(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The bound repository, or `None` when the client has no repository.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn get_repository(&self) -> Result<Option<Repository>> {
        let Some(repository) = &self.repository else {
            return Ok(None);
        };
        let body = self
            .get(&format!("/repos/{}/{}", encode(&self.owner), encode(repository)))
            .await?;
        Ok(parse(&body, "repository"))
    }

    /// All branches of the bound repository; empty when it has none.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn get_branches(&self) -> Result<Vec<Branch>> {
        let body = self.get(&format!("{}/branches", self.repo_path()?)).await?;
        Ok(parse_collection(&body, "branches"))
    }

    /// A single branch, `None` when it does not exist.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn get_branch(&self, name: &str) -> Result<Option<Branch>> {
        let path = format!("{}/branches/{}", self.repo_path()?, encode_path(name));
        match self.get(&path).await {
            Ok(body) => Ok(parse(&body, "branch")),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The owner as an organization, `None` when the owner is a plain user.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn get_organization(&self) -> Result<Option<Organization>> {
        match self.get(&format!("/orgs/{}", encode(&self.owner))).await {
            Ok(body) => Ok(parse(&body, "organization")),
            Err(e) if e.is_not_found() => {
                debug!(owner = %self.owner, "Owner is not an organization");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The owner's user record. Organizations resolve here as well.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn get_user(&self) -> Result<Option<RepositoryOwner>> {
        let body = self.get(&format!("/users/{}", encode(&self.owner))).await?;
        Ok(parse(&body, "user"))
    }

    /// Every repository visible for the owner.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn get_repositories(&self) -> Result<Vec<Repository>> {
        let Some(uid) = self.get_user().await?.and_then(|user| user.id) else {
            warn!(owner = %self.owner, "Owner has no numeric id, no repositories listed");
            return Ok(Vec::new());
        };
        let body = self
            .get(&format!(
                "/repos/search?q=_&uid={uid}&limit={DEFAULT_REPOSITORY_READ_LIMIT}"
            ))
            .await?;
        Ok(parse::<RepositorySearch>(&body, "repositories")
            .map(|search| search.data)
            .unwrap_or_default())
    }

    /// Webhooks registered on the bound repository.
    ///
    /// An unreadable list is an error, never an empty list.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn get_web_hooks(&self) -> Result<Vec<WebHook>> {
        let path = format!("{}/hooks", self.repo_path()?);
        debug!(url = %self.url(&path), "Listing webhooks");
        let body = self.get(&path).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "invalid hooks response");
            GogsError::Serialization(e)
        })
    }

    /// Register `hook` and return it with the server-assigned id.
    #[instrument(skip(self, hook), fields(owner = %self.owner, url = %hook.config.url))]
    pub async fn register_commit_web_hook(&self, hook: &WebHook) -> Result<WebHook> {
        let body = self
            .send_json(Method::POST, &format!("{}/hooks", self.repo_path()?), hook)
            .await?;
        Ok(parse(&body, "created hook").unwrap_or_else(|| hook.clone()))
    }

    /// Remove a previously registered hook. The hook id is required.
    #[instrument(skip(self, hook), fields(owner = %self.owner, url = %hook.config.url))]
    pub async fn remove_commit_web_hook(&self, hook: &WebHook) -> Result<()> {
        let id = hook
            .id
            .ok_or_else(|| GogsError::Config("cannot remove a hook without id".to_string()))?;
        let path = format!("{}/hooks/{id}", self.repo_path()?);
        execute(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    /// Create an issue on the bound repository.
    #[instrument(skip(self, issue), fields(owner = %self.owner, title = %issue.title))]
    pub async fn create_issue(&self, issue: &Issue) -> Result<()> {
        let serialized = serde_json::to_string(issue)?;
        debug!(issue = %serialized, "Creating issue");
        self.send_json(Method::POST, &format!("{}/issues", self.repo_path()?), issue)
            .await?;
        Ok(())
    }

    /// Whether `path` exists at the tip of `branch`.
    ///
    /// Any non-200 answer, including transport failures, counts as absent.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn check_path_exists(&self, branch: &str, path: &str) -> bool {
        let Ok(repo_path) = self.repo_path() else {
            return false;
        };
        let path = format!(
            "{repo_path}/raw/{}/{}",
            encode_path(branch),
            encode_path(path.trim_start_matches('/'))
        );
        info!(url = %self.url(&path), "Checking path");
        match self.request(Method::GET, &path).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                error!(error = %e, "Communication error");
                false
            }
        }
    }

    /// Privacy of the bound repository; `false` when it is not found.
    pub async fn is_private(&self) -> Result<bool> {
        Ok(self.get_repository().await?.is_some_and(|r| r.private))
    }

    fn repo_path(&self) -> Result<String> {
        let repository = self
            .repository
            .as_deref()
            .ok_or_else(|| GogsError::RepositoryNotBound {
                owner: self.owner.clone(),
            })?;
        Ok(format!("/repos/{}/{}", encode(&self.owner), encode(repository)))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_BASE_PATH}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.http.request(method, self.url(path));
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    async fn get(&self, path: &str) -> Result<String> {
        let (status, body) = execute(self.request(Method::GET, path)).await?;
        if status != StatusCode::OK {
            return Err(GogsError::Request {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<String> {
        let payload = serde_json::to_string(payload)?;
        let request = self
            .request(method, path)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        let (_, body) = execute(request).await?;
        Ok(body)
    }
}

/// Send `request` and accept 200, 201 and 204.
async fn execute(request: RequestBuilder) -> Result<(StatusCode, String)> {
    let response = request.send().await?;
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Ok((status, String::new()));
    }
    let body = response.text().await?;
    if status != StatusCode::OK && status != StatusCode::CREATED {
        return Err(GogsError::Request {
            status: status.as_u16(),
            body,
        });
    }
    Ok((status, body))
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let parsed =
        Url::parse(trimmed).map_err(|e| GogsError::Config(format!("invalid URL {base_url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GogsError::Config(format!(
            "unsupported URL scheme {} in {base_url}",
            parsed.scheme()
        )));
    }
    Ok(trimmed.to_string())
}

fn build_proxy(config: &ProxyConfig) -> Result<reqwest::Proxy> {
    let mut proxy = reqwest::Proxy::all(&config.url)
        .map_err(|e| GogsError::Config(format!("invalid proxy URL {}: {e}", config.url)))?;
    if let Some(username) = config.username.as_deref().filter(|u| !u.trim().is_empty()) {
        debug!(user = %username, "Using proxy authentication");
        proxy = proxy.basic_auth(username, config.password.as_deref().unwrap_or_default());
    }
    if let Some(no_proxy) = &config.no_proxy {
        proxy = proxy.no_proxy(reqwest::NoProxy::from_string(no_proxy));
    }
    Ok(proxy)
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Encode each `/`-separated part, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/').map(encode).collect::<Vec<_>>().join("/")
}

fn parse<T: DeserializeOwned>(body: &str, what: &str) -> Option<T> {
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "invalid {what} response");
            None
        }
    }
}

fn parse_collection<T: DeserializeOwned>(body: &str, what: &str) -> Vec<T> {
    match serde_json::from_str(body) {
        Ok(values) => values,
        Err(e) => {
            error!(error = %e, "invalid {what} response");
            Vec::new()
        }
    }
}
