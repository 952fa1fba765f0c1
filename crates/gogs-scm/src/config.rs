//! Service configuration.
//!
//! Values come from the environment (see [`Config::from_env`]) and can be
//! overridden by command line flags in the binary.

use std::path::PathBuf;

use gogs_api::{ClientOptions, Credentials, ProxyConfig};
use tracing::debug;
use url::Url;

use crate::error::ConfigError;
use crate::hooks::FULL_PATH;

/// Gogs server used when none is configured.
pub const DEFAULT_SERVER_URL: &str = "https://try.gogs.io";

/// Port the webhook receiver listens on by default.
pub const DEFAULT_PORT: u16 = 8080;

pub const ENV_SERVER_URL: &str = "GOGS_SERVER_URL";
pub const ENV_USERNAME: &str = "GOGS_USERNAME";
pub const ENV_PASSWORD: &str = "GOGS_PASSWORD";
pub const ENV_ROOT_URL: &str = "GOGS_ROOT_URL";
pub const ENV_SOURCES_FILE: &str = "GOGS_SOURCES_FILE";
pub const ENV_PORT: &str = "GOGS_PORT";
pub const ENV_PROXY_URL: &str = "GOGS_PROXY_URL";
pub const ENV_PROXY_USERNAME: &str = "GOGS_PROXY_USERNAME";
pub const ENV_PROXY_PASSWORD: &str = "GOGS_PROXY_PASSWORD";
pub const ENV_NO_PROXY: &str = "GOGS_NO_PROXY";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gogs server base URL, without trailing slash.
    pub server_url: String,
    /// Scan credentials, if any.
    pub credentials: Option<Credentials>,
    /// Public root URL of this service. Webhooks are not registered without it.
    pub root_url: Option<String>,
    /// Webhook receiver port.
    pub port: u16,
    /// YAML file listing source owners.
    pub sources_file: Option<PathBuf>,
    /// Outbound proxy for API calls.
    pub proxy: Option<ProxyConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            credentials: None,
            root_url: None,
            port: DEFAULT_PORT,
            sources_file: None,
            proxy: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults. `GOGS_PORT` must be a valid port.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();

        if let Some(url) = var(ENV_SERVER_URL) {
            config.server_url = url;
        }

        config.credentials =
            Credentials::from_parts(var(ENV_USERNAME).as_deref(), var(ENV_PASSWORD).as_deref());
        config.root_url = var(ENV_ROOT_URL);
        config.sources_file = var(ENV_SOURCES_FILE).map(PathBuf::from);

        if let Some(port) = var(ENV_PORT) {
            config.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_PORT,
                value: port,
            })?;
        }

        config.proxy = var(ENV_PROXY_URL).map(|url| ProxyConfig {
            url,
            username: var(ENV_PROXY_USERNAME),
            password: var(ENV_PROXY_PASSWORD),
            no_proxy: var(ENV_NO_PROXY),
        });

        config.validate()?;
        debug!(server_url = %config.server_url, port = config.port, "Configuration loaded");
        Ok(config)
    }

    /// Check URLs and normalize the server URL.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server_url = normalize_server_url(&self.server_url)?;
        if let Some(root) = &self.root_url {
            parse_http_url(root)?;
        }
        if let Some(proxy) = &self.proxy {
            parse_http_url(&proxy.url)?;
        }
        Ok(())
    }

    /// Public URL of the webhook receiver, if a root URL is configured.
    #[must_use]
    pub fn hook_url(&self) -> Option<String> {
        self.root_url.as_deref().map(hook_url)
    }

    /// Options shared by every API client built from this configuration.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            proxy: self.proxy.clone(),
        }
    }
}

/// Receiver URL under `root_url`.
#[must_use]
pub fn hook_url(root_url: &str) -> String {
    if root_url.ends_with('/') {
        format!("{root_url}{FULL_PATH}")
    } else {
        format!("{root_url}/{FULL_PATH}")
    }
}

/// Validate a server URL and strip one trailing slash.
pub fn normalize_server_url(url: &str) -> Result<String, ConfigError> {
    let trimmed = url.trim();
    parse_http_url(trimmed)?;
    Ok(trimmed.strip_suffix('/').unwrap_or(trimmed).to_string())
}

pub(crate) fn parse_http_url(url: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}
