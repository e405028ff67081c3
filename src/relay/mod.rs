//! Poll-and-forward relay: new notifications become toasts on a remote sink.

pub mod mapper;
pub mod notifier;

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::types::RelayConfig;
use crate::error::FetchError;
use crate::github::client::{GitHubApi, Transport};
use crate::github::notifications::fetch_notifications;

pub use mapper::{RelayAction, RelayPayload, Status, map_notification, should_forward};
pub use notifier::Notifier;

/// The forwarded-id set is pruned once it grows past this.
pub const FORWARDED_CAP: usize = 10_000;

/// Counts for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub excluded: usize,
    pub forwarded: usize,
    pub failed: usize,
}

pub struct Relay<T> {
    api: GitHubApi<T>,
    notifier: Notifier,
    source: String,
    exclude_orgs: Vec<String>,
    exclude_repos: Vec<String>,
    since: DateTime<Utc>,
    forwarded: HashSet<String>,
}

impl<T: Transport> Relay<T> {
    /// Only notifications updated after `since` are ever forwarded.
    pub fn new(api: GitHubApi<T>, notifier: Notifier, config: &RelayConfig, since: DateTime<Utc>) -> Self {
        Self {
            api,
            notifier,
            source: config.source.clone(),
            exclude_orgs: config.exclude_orgs.clone(),
            exclude_repos: config.exclude_repos.clone(),
            since,
            forwarded: HashSet::new(),
        }
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn forwarded_count(&self) -> usize {
        self.forwarded.len()
    }

    /// Fetch once and forward everything new. Delivery failures are logged
    /// and retried on the next cycle; only a failed fetch is an error.
    pub async fn poll_once(&mut self) -> Result<PollReport, FetchError> {
        let fetched_at = Utc::now();
        let notifications = fetch_notifications(&self.api, self.since).await?;
        let mut report = PollReport {
            fetched: notifications.len(),
            ..PollReport::default()
        };

        let fresh: Vec<_> = notifications
            .iter()
            .filter(|n| !self.forwarded.contains(&n.id))
            .collect();
        if !fresh.is_empty() {
            tracing::info!("relay: {} new notification(s)", fresh.len());
        }

        for notification in fresh {
            if !should_forward(notification, &self.exclude_orgs, &self.exclude_repos) {
                tracing::debug!("relay: excluded {}", notification.repository.full_name());
                report.excluded += 1;
                continue;
            }
            let payload = map_notification(notification, &self.source);
            match self.notifier.send(&payload).await {
                Ok(()) => {
                    self.forwarded.insert(notification.id.clone());
                    report.forwarded += 1;
                    tracing::info!("relay: forwarded: {}", notification.subject.title);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        "relay: failed to forward {:?}: {e:#}",
                        notification.subject.title
                    );
                }
            }
        }

        self.since = fetched_at;

        if self.forwarded.len() > FORWARDED_CAP {
            let current: HashSet<&str> = notifications.iter().map(|n| n.id.as_str()).collect();
            self.forwarded.retain(|id| current.contains(id.as_str()));
        }
        Ok(report)
    }

    /// Poll forever. A failed cycle is logged and the loop carries on.
    pub async fn run(mut self, poll_interval: Duration) {
        tracing::info!("relay: polling every {}s", poll_interval.as_secs());
        tracing::info!("relay: target {}", self.notifier.endpoint());
        tracing::info!("relay: source {}", self.source);

        let mut tick = tokio::time::interval(poll_interval.max(Duration::from_secs(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if let Err(e) = self.poll_once().await {
                tracing::error!("relay: poll error: {e}");
            }
        }
    }
}
