use std::path::PathBuf;

use serde::Deserialize;

use crate::mutation::MutationKind;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GithubConfig,
    pub list: ListConfig,
    pub enrichment: EnrichmentConfig,
    pub timeline: TimelineConfig,
    pub state: StateConfig,
    pub relay: RelayConfig,
}

// ---------------------------------------------------------------------------
// [github]
// ---------------------------------------------------------------------------

/// What the "done" key does to a notification thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneAction {
    /// PATCH the thread (mark as read).
    #[default]
    Read,
    /// DELETE the thread (mark as done).
    Done,
}

impl DoneAction {
    pub fn mutation_kind(self) -> MutationKind {
        match self {
            Self::Read => MutationKind::MarkRead,
            Self::Done => MutationKind::MarkDone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub host: String,
    pub per_page: u8,
    pub refetch_interval_minutes: u32,
    pub cache_ttl_minutes: u32,
    pub request_timeout_secs: u64,
    pub done_action: DoneAction,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_owned(),
            per_page: 50,
            refetch_interval_minutes: 5,
            cache_ttl_minutes: 5,
            request_timeout_secs: 30,
            done_action: DoneAction::Read,
        }
    }
}

// ---------------------------------------------------------------------------
// [list], [enrichment], [timeline], [state]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub window_size: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self { window_size: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub concurrency: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: crate::enrichment::DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub chunk_size: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::timeline::DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Override for the state file location.
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// [relay]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the notification sink; `/notify` is appended.
    pub url: Option<String>,
    pub secret: Option<String>,
    pub poll_interval_seconds: u64,
    pub source: String,
    pub exclude_orgs: Vec<String>,
    pub exclude_repos: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            poll_interval_seconds: 60,
            source: "github".to_owned(),
            exclude_orgs: Vec::new(),
            exclude_repos: Vec::new(),
        }
    }
}
