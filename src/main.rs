use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;

use gh_notifier::cache::RecordCache;
use gh_notifier::config::loader;
use gh_notifier::config::types::AppConfig;
use gh_notifier::github::auth::resolve_token;
use gh_notifier::github::{GitHubApi, OctocrabTransport, api_base_for_host};
use gh_notifier::grouping::{Groups, ListEntry};
use gh_notifier::relay::{Notifier, Relay};
use gh_notifier::store::{self, FileStore, KEY_GITHUB_TOKEN, Store};
use gh_notifier::url::web_url;
use gh_notifier::util::{format_relative_time, truncate};

#[derive(Parser)]
#[command(name = "gh-notifier", version, about = "GitHub notifications client")]
struct Cli {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging to debug.log.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh and print the grouped notification list.
    List {
        /// Discard the cached snapshot and fetch everything.
        #[arg(long)]
        full: bool,
    },
    /// Forward new notifications to a notification sink.
    Relay,
    /// Print the browser URL for a GitHub API URL.
    WebUrl {
        api_url: String,
    },
    /// Save a personal access token in the state file.
    Login {
        token: String,
    },
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        let msg = format!("{info}\n\n{backtrace}");
        let _ = std::fs::write("panic.log", &msg);
        eprintln!("{msg}");
    }));

    let cli = Cli::parse();

    if let Commands::WebUrl { api_url } = &cli.command {
        println!("{}", web_url(api_url));
        return Ok(());
    }

    init_tracing(cli.debug, matches!(cli.command, Commands::Relay))?;

    let config = loader::load_config(cli.config.as_deref())?;
    let mut store = open_store(&config)?;

    // Install the rustls CryptoProvider before any TLS client is constructed.
    // rustls 0.23 no longer auto-installs a provider.
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    match cli.command {
        Commands::Login { token } => {
            store.save(KEY_GITHUB_TOKEN, Value::String(token.trim().to_owned()))?;
            println!("token saved to {}", store.path().display());
            Ok(())
        }
        Commands::List { full } => {
            let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
            rt.block_on(run_list(&config, &mut store, full))
        }
        Commands::Relay => {
            let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
            rt.block_on(run_relay(config, &store))
        }
        Commands::WebUrl { .. } => Ok(()),
    }
}

fn init_tracing(debug: bool, relay: bool) -> Result<()> {
    if debug {
        let file = std::fs::File::create("debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
    } else if relay {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<FileStore> {
    let path = match &config.state.path {
        Some(path) => loader::expand_tilde(path),
        None => store::default_state_path()
            .context("cannot locate a state directory; set [state] path in the config")?,
    };
    FileStore::open(path)
}

fn api_for(config: &AppConfig, store: &dyn Store, per_page: u8) -> Result<GitHubApi<OctocrabTransport>> {
    let host = &config.github.host;
    let (token, source) = resolve_token(host, store::stored_token(store))?;
    tracing::debug!("using GitHub token from {source:?}");
    let transport = OctocrabTransport::new(host, &token)?;
    Ok(GitHubApi::new(
        transport,
        api_base_for_host(host),
        per_page,
        config.github.cache_ttl_minutes,
    ))
}

async fn run_list(config: &AppConfig, store: &mut FileStore, full: bool) -> Result<()> {
    let api = api_for(config, &*store, config.github.per_page)?;
    let mut cache = RecordCache::load(&*store);
    match cache.refresh(&api, full).await {
        Ok(count) => {
            tracing::debug!("fetched {count} notifications");
            cache.save(store)?;
        }
        Err(e) if e.is_auth() => {
            store.remove(KEY_GITHUB_TOKEN)?;
            bail!("GitHub rejected the token ({e}); it has been cleared");
        }
        Err(e) => eprintln!("refresh failed, showing cached notifications: {e}"),
    }

    let mut groups = Groups::from_notifications(cache.notifications());
    groups.set_all_expanded(true);
    for entry in groups.flatten() {
        match entry {
            ListEntry::Group { key, count, .. } => println!("{key} ({count})"),
            ListEntry::Notification(n) => println!(
                "  {:>4}  {:<16}  {}  {}",
                format_relative_time(&n.updated_at),
                n.reason.label(),
                truncate(&n.subject.title, 72),
                n.web_url()
            ),
        }
    }
    if cache.is_empty() {
        println!("no unread notifications");
    }
    Ok(())
}

async fn run_relay(mut config: AppConfig, store: &FileStore) -> Result<()> {
    loader::apply_relay_env(&mut config.relay)?;
    let relay_config = &config.relay;
    let Some(url) = relay_config.url.as_deref() else {
        bail!("relay needs a sink URL: set [relay] url or CROSS_NOTIFIER_URL");
    };
    let Some(secret) = relay_config.secret.as_deref() else {
        bail!("relay needs a secret: set [relay] secret or CROSS_NOTIFIER_SECRET");
    };

    let api = api_for(&config, store, 100)?;
    let notifier = Notifier::new(url, secret);
    let relay = Relay::new(api, notifier, relay_config, Utc::now());
    relay
        .run(Duration::from_secs(relay_config.poll_interval_seconds))
        .await;
    Ok(())
}
