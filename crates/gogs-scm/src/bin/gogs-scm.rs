//! Gogs SCM service binary.
//!
//! Serves the webhook receiver and exposes discovery, scanning and hook
//! management as one-shot commands.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gogs_api::{Credentials, ProxyConfig};
use gogs_scm::{
    build_router, notify_build_status, BuildEvent, BuildResult, Config, GogsConnector,
    GogsScmNavigator, GogsScmSource, HookReceiver, HookRegistrar, PathExistsCriteria, ScmHead,
    ScmRevision, SourceOwners, StaticSourceOwners, WebhookManager,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Gogs SCM - branch discovery and webhook handling for Gogs repositories.
#[derive(Parser)]
#[command(name = "gogs-scm", version)]
#[command(about = "Discover Gogs branches and keep build sources in sync through webhooks")]
struct Cli {
    /// Gogs server URL.
    #[arg(long, env = "GOGS_SERVER_URL", global = true)]
    server_url: Option<String>,

    /// Scan username.
    #[arg(long, env = "GOGS_USERNAME", global = true)]
    username: Option<String>,

    /// Scan password or access token.
    #[arg(long, env = "GOGS_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Public root URL of this service, used as the webhook target.
    #[arg(long, env = "GOGS_ROOT_URL", global = true)]
    root_url: Option<String>,

    /// YAML file listing source owners.
    #[arg(long, env = "GOGS_SOURCES_FILE", global = true)]
    sources_file: Option<PathBuf>,

    /// Outbound proxy URL.
    #[arg(long, env = "GOGS_PROXY_URL", global = true)]
    proxy_url: Option<String>,

    /// Hosts that bypass the proxy (comma-separated).
    #[arg(long, env = "GOGS_NO_PROXY", global = true)]
    no_proxy: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook receiver.
    Serve {
        /// Listen port.
        #[arg(long, env = "GOGS_PORT")]
        port: Option<u16>,
    },

    /// Discover the branches of one repository.
    Branches {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Space-separated branch wildcards to include.
        #[arg(long, default_value = "*")]
        includes: String,

        /// Space-separated branch wildcards to exclude.
        #[arg(long, default_value = "")]
        excludes: String,

        /// Only report branches containing this file.
        #[arg(long)]
        require_path: Option<String>,
    },

    /// Show the current revision of one branch.
    Head {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        #[arg(long)]
        branch: String,
    },

    /// List the repositories an owner scan would propose.
    Repos {
        #[arg(long)]
        owner: String,

        /// Regular expression the whole repository name must match.
        #[arg(long, default_value = ".*")]
        pattern: String,
    },

    /// Register or remove webhooks for every configured owner.
    Hooks {
        #[command(subcommand)]
        action: HookAction,
    },

    /// Report a build result on a repository.
    Notify {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Commit hash the build ran on.
        #[arg(long)]
        revision: String,

        /// success, unstable, failure, aborted or not_built.
        #[arg(long, value_parser = parse_build_result)]
        result: BuildResult,

        #[arg(long)]
        build_url: String,

        /// Job name, usually the branch.
        #[arg(long)]
        job: String,

        /// Label attached to created issues; 0 for none.
        #[arg(long, default_value = "0")]
        label_id: i64,
    },
}

#[derive(Clone, Copy, Subcommand)]
enum HookAction {
    Register,
    Remove,
}

fn parse_build_result(value: &str) -> Result<BuildResult, String> {
    match value.to_ascii_lowercase().as_str() {
        "success" => Ok(BuildResult::Success),
        "unstable" => Ok(BuildResult::Unstable),
        "failure" => Ok(BuildResult::Failure),
        "aborted" => Ok(BuildResult::Aborted),
        "not_built" => Ok(BuildResult::NotBuilt),
        other => Err(format!("unknown build result: {other}")),
    }
}

impl Cli {
    /// Environment configuration with command line overrides applied.
    fn config(&self) -> Result<Config> {
        let mut config = Config::from_env().context("Invalid environment configuration")?;

        if let Some(url) = &self.server_url {
            config.server_url.clone_from(url);
        }
        if self.username.is_some() || self.password.is_some() {
            config.credentials =
                Credentials::from_parts(self.username.as_deref(), self.password.as_deref());
        }
        if self.root_url.is_some() {
            config.root_url.clone_from(&self.root_url);
        }
        if self.sources_file.is_some() {
            config.sources_file.clone_from(&self.sources_file);
        }
        if let Some(url) = &self.proxy_url {
            let mut proxy = config.proxy.take().unwrap_or_default();
            proxy.url.clone_from(url);
            config.proxy = Some(proxy);
        }
        if let Some(no_proxy) = &self.no_proxy {
            let proxy = config.proxy.get_or_insert_with(ProxyConfig::default);
            proxy.no_proxy = Some(no_proxy.clone());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = cli.config()?;
    let connector = GogsConnector::new(config.client_options());
    let shutdown = CancellationToken::new();

    match cli.command {
        Commands::Serve { port } => serve(config, connector, shutdown, port).await,
        Commands::Branches {
            owner,
            repo,
            includes,
            excludes,
            require_path,
        } => {
            let source = GogsScmSource::new(&config.server_url, &owner, &repo)?
                .with_credentials(config.credentials.clone())
                .with_patterns(&includes, &excludes)?;
            let criteria = require_path.map(PathExistsCriteria::new);

            cancel_on_ctrl_c(shutdown.clone());
            let mut heads: Vec<(ScmHead, ScmRevision)> = Vec::new();
            let stats = source
                .retrieve(
                    &connector,
                    criteria.as_ref().map(|c| c as &dyn gogs_scm::Criteria),
                    &mut heads,
                    &shutdown,
                )
                .await
                .context("Branch discovery failed")?;

            for (head, revision) in &heads {
                println!("{}\t{}", head.name, revision.hash);
            }
            info!(
                examined = stats.examined,
                excluded = stats.excluded,
                rejected = stats.rejected,
                emitted = stats.emitted,
                "Done"
            );
            Ok(())
        }
        Commands::Head {
            owner,
            repo,
            branch,
        } => {
            let source = GogsScmSource::new(&config.server_url, &owner, &repo)?
                .with_credentials(config.credentials.clone());
            match source.retrieve_head(&connector, &branch).await? {
                Some(revision) => println!("{}\t{}", revision.head.name, revision.hash),
                None => bail!("No revision found for branch {branch} in {owner}/{repo}"),
            }
            Ok(())
        }
        Commands::Repos { owner, pattern } => {
            let navigator = GogsScmNavigator::new(&config.server_url, &owner)?
                .with_credentials(config.credentials.clone())
                .with_pattern(&pattern)?;

            cancel_on_ctrl_c(shutdown.clone());
            let mut sources: Vec<GogsScmSource> = Vec::new();
            navigator
                .visit_sources(&connector, &mut sources, &shutdown)
                .await
                .context("Repository scan failed")?;

            for source in &sources {
                println!("{}\t{}", source.full_name(), source.checkout_url());
            }
            Ok(())
        }
        Commands::Hooks { action } => {
            let owners: Arc<dyn SourceOwners> = Arc::new(load_owners(&config, &shutdown)?);
            let manager = WebhookManager::new(connector, Arc::clone(&owners), config.hook_url());
            let (registrar, worker) = HookRegistrar::spawn(manager);

            for owner in owners.all() {
                match action {
                    HookAction::Register => registrar.on_created(owner),
                    HookAction::Remove => registrar.on_deleted(owner),
                }
            }
            registrar.flush().await;
            drop(registrar);
            worker.await.context("Hook registrar failed")?;
            Ok(())
        }
        Commands::Notify {
            owner,
            repo,
            revision,
            result,
            build_url,
            job,
            label_id,
        } => {
            let source = GogsScmSource::new(&config.server_url, &owner, &repo)?
                .with_credentials(config.credentials.clone())
                .with_build_failure_label_id(label_id);
            let event = BuildEvent {
                revision,
                result: Some(result),
                build_url,
                job_name: job,
            };
            notify_build_status(&connector, &source, &event).await;
            Ok(())
        }
    }
}

async fn serve(
    config: Config,
    connector: GogsConnector,
    shutdown: CancellationToken,
    port: Option<u16>,
) -> Result<()> {
    let owners: Arc<dyn SourceOwners> = Arc::new(load_owners(&config, &shutdown)?);

    let hook_url = config.hook_url();
    if hook_url.is_none() {
        warn!("GOGS_ROOT_URL is not set, webhooks will not be registered");
    }
    let manager = WebhookManager::new(connector, Arc::clone(&owners), hook_url);
    let (registrar, _worker) = HookRegistrar::spawn(manager);
    for owner in owners.all() {
        registrar.on_created(owner);
    }

    let app = build_router(HookReceiver::new(owners));

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.port)));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(%addr, "Gogs webhook receiver listening");

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
            token.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    Ok(())
}

fn load_owners(config: &Config, shutdown: &CancellationToken) -> Result<StaticSourceOwners> {
    match &config.sources_file {
        Some(path) => StaticSourceOwners::load(path, config, shutdown)
            .with_context(|| format!("Failed to load sources from {}", path.display())),
        None => {
            warn!("GOGS_SOURCES_FILE is not set, no sources configured");
            Ok(StaticSourceOwners::default())
        }
    }
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
}
