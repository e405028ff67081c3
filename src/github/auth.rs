use std::process::Command;

use anyhow::{Context, Result, bail};

/// Where a resolved token came from, for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Store,
    GhCli,
    Env(&'static str),
}

/// Resolve a GitHub auth token for the given host.
///
/// Priority:
/// 1. token saved in the state store (`gh-notifier login`)
/// 2. `gh auth token --hostname {host}` (gh CLI)
/// 3. `GH_TOKEN` environment variable
/// 4. `GITHUB_TOKEN` environment variable
pub fn resolve_token(host: &str, stored: Option<String>) -> Result<(String, TokenSource)> {
    if let Some(token) = stored.filter(|t| !t.is_empty()) {
        return Ok((token, TokenSource::Store));
    }

    if let Ok(token) = token_from_gh_cli(host) {
        return Ok((token, TokenSource::GhCli));
    }

    for var in ["GH_TOKEN", "GITHUB_TOKEN"] {
        if let Ok(token) = std::env::var(var)
            && !token.is_empty()
        {
            return Ok((token, TokenSource::Env(var)));
        }
    }

    bail!(
        "no GitHub token found for host \"{host}\". \
         Run `gh-notifier login <token>`, `gh auth login`, or set GH_TOKEN / GITHUB_TOKEN."
    )
}

fn token_from_gh_cli(host: &str) -> Result<String> {
    let output = Command::new("gh")
        .args(["auth", "token", "--hostname", host])
        .output()
        .context("failed to run `gh auth token`")?;

    if !output.status.success() {
        bail!("gh auth token exited with non-zero status");
    }

    let token = String::from_utf8(output.stdout)
        .context("gh auth token produced non-UTF-8 output")?
        .trim()
        .to_owned();

    if token.is_empty() {
        bail!("gh auth token returned empty string");
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_token_wins() {
        let (token, source) = resolve_token("github.com", Some("ghp_stored".to_owned())).unwrap();
        assert_eq!(token, "ghp_stored");
        assert_eq!(source, TokenSource::Store);
    }
}
