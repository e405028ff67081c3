use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::types::{AppConfig, RelayConfig};

/// Discover and load the app config.
///
/// Priority:
/// 1. `--config` flag (explicit path)
/// 2. `$GH_NOTIFIER_CONFIG` environment variable
/// 3. `$XDG_CONFIG_HOME/gh-notifier/config.toml`
/// 4. `~/.config/gh-notifier/config.toml`
///
/// With no file found the built-in defaults are used. An explicit path that
/// does not exist is an error.
pub fn load_config(explicit_path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit_path {
        return load_file(path);
    }
    match find_global_config() {
        Some(path) => load_file(&path),
        None => Ok(AppConfig::default()),
    }
}

fn load_file(path: &Path) -> Result<AppConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML from {}", path.display()))?;
    Ok(config)
}

fn find_global_config() -> Option<PathBuf> {
    // $GH_NOTIFIER_CONFIG
    if let Ok(path) = std::env::var("GH_NOTIFIER_CONFIG") {
        let p = PathBuf::from(&path);
        if p.is_file() {
            return Some(p);
        }
    }

    // $XDG_CONFIG_HOME/gh-notifier/config.toml
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let p = PathBuf::from(xdg).join("gh-notifier/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // ~/.config/gh-notifier/config.toml
    if let Some(home) = home_dir() {
        let p = home.join(".config/gh-notifier/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    None
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Expand a leading `~/` in a configured path.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// Overlay the relay's environment variables on top of the file config.
///
/// `CROSS_NOTIFIER_URL`, `CROSS_NOTIFIER_SECRET`, `POLL_INTERVAL_SECONDS` and
/// `NOTIFIER_SOURCE` win over `[relay]` when set and non-empty.
pub fn apply_relay_env(relay: &mut RelayConfig) -> Result<()> {
    apply_relay_overrides(relay, |name| std::env::var(name).ok())
}

/// Same as [`apply_relay_env`] with an injectable lookup.
pub fn apply_relay_overrides(
    relay: &mut RelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("CROSS_NOTIFIER_URL") {
        relay.url = Some(url);
    }
    if let Some(secret) = get("CROSS_NOTIFIER_SECRET") {
        relay.secret = Some(secret);
    }
    if let Some(interval) = get("POLL_INTERVAL_SECONDS") {
        relay.poll_interval_seconds = interval
            .trim()
            .parse()
            .with_context(|| format!("POLL_INTERVAL_SECONDS must be a number, got {interval:?}"))?;
    }
    if let Some(source) = get("NOTIFIER_SOURCE") {
        relay.source = source;
    }
    Ok(())
}
