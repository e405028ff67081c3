//! State owned by the engine loop. Nothing in here performs I/O; the loop in
//! `engine::github` spawns the network calls and feeds their results back.

use std::collections::HashSet;
use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};

use crate::cache::RecordCache;
use crate::enrichment::EnrichmentQueue;
use crate::grouping::{Groups, ListEntry};
use crate::timeline::Timeline;
use crate::types::{Notification, PrStatus};
use crate::window::WindowState;

use super::interface::{DetailView, Event, ListRow, ListView};

/// The open detail view. `ticket` identifies the assembly request so a late
/// result for a view that was closed or replaced is dropped.
pub struct DetailState {
    pub id: String,
    pub ticket: u64,
    pub timeline: Option<Timeline>,
}

impl DetailState {
    pub fn view(&self) -> Option<DetailView> {
        let timeline = self.timeline.as_ref()?;
        Some(DetailView {
            id: self.id.clone(),
            subject: timeline.subject().clone(),
            items: timeline.revealed().to_vec(),
            has_more: timeline.has_more(),
            estimated_total_lines: timeline.estimated_total_lines(),
        })
    }
}

pub struct Session {
    pub cache: RecordCache,
    pub groups: Groups,
    pub window: WindowState,
    pub enrichment: EnrichmentQueue<PrStatus>,
    /// Login of the authenticated user, needed for "approved by me".
    pub viewer: Option<String>,
    pub viewer_requested: bool,
    pub detail: Option<DetailState>,
    /// Records removed optimistically whose remote call has not finished.
    pub pending: HashSet<String>,
    pub refreshing: bool,
    pub error: Option<String>,
    subscribers: Vec<Sender<Event>>,
    next_ticket: u64,
}

impl Session {
    pub fn new(cache: RecordCache, window_size: usize, enrichment: EnrichmentQueue<PrStatus>) -> Self {
        let groups = Groups::from_notifications(cache.notifications());
        let mut window = WindowState::new(window_size);
        window.clamp(groups.flat_len());
        Self {
            cache,
            groups,
            window,
            enrichment,
            viewer: None,
            viewer_requested: false,
            detail: None,
            pending: HashSet::new(),
            refreshing: false,
            error: None,
            subscribers: Vec::new(),
            next_ticket: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Event fan-out
    // -----------------------------------------------------------------------

    pub fn subscribe(&mut self, tx: Sender<Event>) {
        self.subscribers.push(tx);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send `event` to every subscriber, forgetting the ones that hung up.
    pub fn publish(&mut self, event: &Event) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn publish_list(&mut self) {
        let view = Event::ListChanged(self.list_view());
        self.publish(&view);
    }

    pub fn report_error(&mut self, event: Event) {
        if let Event::FetchFailed { message, .. } | Event::MutationFailed { message, .. } = &event {
            self.error = Some(message.clone());
        }
        self.publish(&event);
    }

    // -----------------------------------------------------------------------
    // List
    // -----------------------------------------------------------------------

    pub fn total(&self) -> usize {
        self.groups.flat_len()
    }

    pub fn list_view(&self) -> ListView {
        let total = self.total();
        let range = self.window.visible_range(total);
        let flat = self.groups.flatten();
        let rows = flat[range.clone()]
            .iter()
            .map(|entry| ListRow {
                status: entry
                    .notification()
                    .and_then(|n| self.enrichment.resolved(&n.id).copied()),
                entry: entry.clone(),
            })
            .collect();
        ListView {
            rows,
            start: range.start,
            selected: self.window.selected(),
            total,
        }
    }

    pub fn selected_entry(&self) -> Option<ListEntry> {
        self.groups.entry_at(self.window.selected())
    }

    /// Regroup from the cache and re-clamp the window.
    pub fn rebuild(&mut self) {
        self.groups.regroup(self.cache.notifications());
        self.window.clamp(self.total());
    }

    /// Merge a finished fetch. Records with a mutation still in flight stay
    /// hidden even if the server returned them again.
    pub fn apply_fetched(&mut self, fetched: Vec<Notification>, started_at: DateTime<Utc>) {
        self.cache.apply_refresh(fetched, started_at);
        for id in &self.pending {
            self.cache.remove(id);
        }
        self.rebuild();
    }

    /// Toggle group `key`, keeping the cursor on its header.
    pub fn toggle_group(&mut self, key: &str) -> bool {
        if !self.groups.toggle(key) {
            return false;
        }
        let total = self.total();
        match self.groups.header_index(key) {
            Some(header) => self.window.select(header, total),
            None => self.window.clamp(total),
        }
        true
    }

    pub fn set_all_expanded(&mut self, expanded: bool) {
        let key = self.selected_group_key();
        self.groups.set_all_expanded(expanded);
        let total = self.total();
        match key.and_then(|k| self.groups.header_index(&k)) {
            Some(header) if !expanded => self.window.select(header, total),
            _ => self.window.clamp(total),
        }
    }

    /// Key of the group under the cursor, whether on its header or a member.
    pub fn selected_group_key(&self) -> Option<String> {
        match self.selected_entry()? {
            ListEntry::Group { key, .. } => Some(key),
            ListEntry::Notification(n) => Some(n.group_key()),
        }
    }

    /// Pull-request records on screen: `(id, subject API url)`.
    pub fn visible_pull_requests(&self) -> Vec<(String, String)> {
        let range = self.window.visible_range(self.total());
        self.groups.flatten()[range]
            .iter()
            .filter_map(ListEntry::notification)
            .filter(|n| n.is_pull_request())
            .filter_map(|n| Some((n.id.clone(), n.subject.url.clone()?)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Detail
    // -----------------------------------------------------------------------

    /// Start a new detail view for `id`, replacing any open one.
    pub fn open_detail(&mut self, id: &str) -> u64 {
        self.next_ticket += 1;
        self.detail = Some(DetailState {
            id: id.to_owned(),
            ticket: self.next_ticket,
            timeline: None,
        });
        self.next_ticket
    }

    /// The open detail view, if `ticket` still identifies it.
    pub fn detail_for_ticket(&mut self, ticket: u64) -> Option<&mut DetailState> {
        self.detail.as_mut().filter(|d| d.ticket == ticket)
    }

    pub fn timeline_mut(&mut self) -> Option<(&str, &mut Timeline)> {
        let detail = self.detail.as_mut()?;
        Some((detail.id.as_str(), detail.timeline.as_mut()?))
    }
}
