//! Record cache: the last-known notification set plus the fetch watermark.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::FetchError;
use crate::github::client::{GitHubApi, Transport};
use crate::github::notifications::fetch_notifications;
use crate::store::{KEY_LAST_FETCH_TIME, KEY_NOTIFICATIONS, Store};
use crate::types::Notification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCache {
    notifications: Vec<Notification>,
    watermark: DateTime<Utc>,
}

impl Default for RecordCache {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
            watermark: DateTime::UNIX_EPOCH,
        }
    }
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications, most recently updated first.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    /// Decide where the next fetch starts. A forced full refresh discards the
    /// snapshot and resets the watermark before anything is fetched.
    pub fn plan_refresh(&mut self, force_full: bool) -> DateTime<Utc> {
        if force_full {
            self.notifications.clear();
            self.watermark = DateTime::UNIX_EPOCH;
        }
        self.watermark
    }

    /// Merge a fetch result that started at `started_at`.
    ///
    /// Incoming records come first (first occurrence wins inside the batch),
    /// then cached records that were not re-fetched; the result is
    /// stable-sorted newest first. The watermark never moves backwards.
    pub fn apply_refresh(&mut self, fetched: Vec<Notification>, started_at: DateTime<Utc>) {
        let mut seen: HashSet<String> = HashSet::with_capacity(fetched.len());
        let mut merged = Vec::with_capacity(fetched.len() + self.notifications.len());

        for n in fetched {
            if seen.insert(n.id.clone()) {
                merged.push(n);
            }
        }
        for n in self.notifications.drain(..) {
            if !seen.contains(&n.id) {
                merged.push(n);
            }
        }
        merged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        self.notifications = merged;
        self.watermark = self.watermark.max(started_at);
    }

    /// Plan, fetch and merge in one go. Returns the number of records fetched.
    pub async fn refresh<T: Transport>(
        &mut self,
        api: &GitHubApi<T>,
        force_full: bool,
    ) -> Result<usize, FetchError> {
        let since = self.plan_refresh(force_full);
        let started_at = Utc::now();
        let fetched = fetch_notifications(api, since).await?;
        let count = fetched.len();
        self.apply_refresh(fetched, started_at);
        Ok(count)
    }

    /// Take a record out locally. The watermark is untouched.
    pub fn remove(&mut self, id: &str) -> Option<(usize, Notification)> {
        let idx = self.notifications.iter().position(|n| n.id == id)?;
        Some((idx, self.notifications.remove(idx)))
    }

    /// Put a removed record back where its update time places it; `index`
    /// only orders it among records with the same time. A copy with the same
    /// id that arrived in the meantime is replaced rather than duplicated.
    pub fn restore(&mut self, notification: Notification, index: usize) {
        if let Some(existing) = self.notifications.iter_mut().find(|n| n.id == notification.id) {
            *existing = notification;
            return;
        }
        let index = insertion_index(&self.notifications, &notification, index);
        self.notifications.insert(index, notification);
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Read the snapshot from `store`. Missing or unreadable entries yield an
    /// empty cache with an epoch watermark.
    pub fn load(store: &dyn Store) -> Self {
        let notifications = store
            .load(KEY_NOTIFICATIONS)
            .and_then(|v| match serde_json::from_value::<Vec<Notification>>(v) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!("ignoring unreadable cached notifications: {e}");
                    None
                }
            })
            .unwrap_or_default();
        let watermark = store
            .load(KEY_LAST_FETCH_TIME)
            .and_then(|v| v.as_str().map(str::to_owned))
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map_or(DateTime::UNIX_EPOCH, |dt| dt.with_timezone(&Utc));

        let mut cache = Self {
            notifications: Vec::new(),
            watermark,
        };
        // Re-run the merge so a hand-edited snapshot is still id-unique.
        cache.apply_refresh(notifications, DateTime::UNIX_EPOCH);
        cache
    }

    pub fn save(&self, store: &mut dyn Store) -> Result<()> {
        let list = serde_json::to_value(&self.notifications).context("serializing notifications")?;
        store.save(KEY_NOTIFICATIONS, list)?;
        store.save(
            KEY_LAST_FETCH_TIME,
            Value::String(self.watermark.to_rfc3339()),
        )?;
        Ok(())
    }
}

/// Position that keeps newest-first `list` sorted once `notification` is
/// inserted. Among equal update times, `hint` (clamped) picks the slot.
pub(crate) fn insertion_index(list: &[Notification], notification: &Notification, hint: usize) -> usize {
    let first = list.partition_point(|n| n.updated_at > notification.updated_at);
    let last = list.partition_point(|n| n.updated_at >= notification.updated_at);
    hint.clamp(first, last)
}
