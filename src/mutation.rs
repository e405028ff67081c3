//! Optimistic mutations: remove locally first, confirm remotely, put the
//! record back in update-time order if the remote call fails.

use serde::{Deserialize, Serialize};

use crate::cache::RecordCache;
use crate::error::FetchError;
use crate::github::client::{GitHubApi, Transport};
use crate::github::notifications as notif;
use crate::grouping::{Groups, Placement};
use crate::types::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    MarkRead,
    MarkDone,
    Unsubscribe,
}

impl MutationKind {
    pub fn describe(self) -> &'static str {
        match self {
            Self::MarkRead => "mark as read",
            Self::MarkDone => "mark as done",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Everything needed to undo one optimistic removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationIntent {
    pub kind: MutationKind,
    pub notification: Notification,
    pub cache_index: usize,
    /// `None` when the record was cached but not grouped.
    pub placement: Option<Placement>,
}

/// Optimistically remove `id` from the cache and its group.
///
/// Returns `None` when the record is unknown (already removed, or never
/// fetched); nothing is changed in that case.
pub fn begin(
    kind: MutationKind,
    id: &str,
    cache: &mut RecordCache,
    groups: &mut Groups,
) -> Option<MutationIntent> {
    let (cache_index, notification) = cache.remove(id)?;
    let placement = groups.remove(id).map(|(placement, _)| placement);
    Some(MutationIntent {
        kind,
        notification,
        cache_index,
        placement,
    })
}

/// Optimistically remove every record of group `key`, in display order.
///
/// Roll the returned intents back in reverse order to restore the group
/// exactly.
pub fn begin_group(
    kind: MutationKind,
    key: &str,
    cache: &mut RecordCache,
    groups: &mut Groups,
) -> Vec<MutationIntent> {
    let ids: Vec<String> = groups
        .get(key)
        .map(|g| g.notifications.iter().map(|n| n.id.clone()).collect())
        .unwrap_or_default();
    ids.iter()
        .filter_map(|id| begin(kind, id, cache, groups))
        .collect()
}

/// Issue the remote call that makes the optimistic removal true.
pub async fn confirm<T: Transport>(api: &GitHubApi<T>, intent: &MutationIntent) -> Result<(), FetchError> {
    let id = &intent.notification.id;
    match intent.kind {
        MutationKind::MarkRead => notif::mark_thread_read(api, id).await,
        MutationKind::MarkDone => notif::mark_thread_done(api, id).await,
        MutationKind::Unsubscribe => {
            notif::unsubscribe_thread(api, &intent.notification).await?;
            notif::mark_thread_read(api, id).await
        }
    }
}

/// Undo [`begin`]: the record goes back into the cache and its group in
/// update-time order, so rollbacks may arrive in any order. A deleted group is
/// recreated at its old position with its previous expanded flag.
pub fn rollback(intent: MutationIntent, cache: &mut RecordCache, groups: &mut Groups) {
    match &intent.placement {
        Some(placement) => groups.restore_at(placement, intent.notification.clone()),
        None => groups.insert(intent.notification.clone()),
    }
    cache.restore(intent.notification, intent.cache_index);
}
