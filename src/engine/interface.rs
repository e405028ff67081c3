use std::sync::mpsc::Sender;

use crate::grouping::ListEntry;
use crate::types::{PrStatus, SubjectBody, TimelineItem};
use crate::window::Motion;

/// Handle to the backend engine held by the presentation layer.
///
/// Cheaply cloneable. When the last handle is dropped the sender channel
/// closes, signalling the engine to shut down.
#[derive(Clone)]
pub struct EngineHandle {
    tx: tokio::sync::mpsc::UnboundedSender<Request>,
}

impl EngineHandle {
    pub(super) fn new(tx: tokio::sync::mpsc::UnboundedSender<Request>) -> Self {
        Self { tx }
    }

    /// Send a request to the engine. Non-blocking, returns immediately.
    pub fn send(&self, req: Request) {
        // Ignore errors: if the receiver is gone the engine has already shut down.
        let _ = self.tx.send(req);
    }
}

pub trait Engine: Send + 'static {
    fn start(self) -> EngineHandle;
}

/// All operations the presentation layer can send to the engine.
pub enum Request {
    /// Receive every event published from now on. The current list is sent
    /// right away; the first subscription also starts the initial refresh.
    Subscribe { notify_tx: Sender<Event> },

    // -----------------------------------------------------------------------
    // List
    // -----------------------------------------------------------------------
    Refresh { force_full: bool },
    Navigate(Motion),
    Select { index: usize },
    Resize { window_size: usize },
    ToggleGroup { key: String },
    /// Toggle the group under the cursor (header or member row).
    ToggleSelected,
    ExpandAll { expanded: bool },

    // -----------------------------------------------------------------------
    // Detail timeline
    // -----------------------------------------------------------------------
    /// Open the record under the cursor; on a group header this toggles it.
    OpenSelected,
    Open { id: String },
    RevealMore,
    /// The detail view scrolled; more items are revealed when close to the end.
    DetailScrolled { offset: usize, viewport: usize },
    CloseDetail,

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------
    /// Apply the configured done action (read or done) to one record.
    MarkDone { id: String },
    MarkGroupDone { key: String },
    Unsubscribe { id: String },

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------
    DismissError,
    Shutdown,
}

/// The visible slice of the flattened list plus the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    /// Rows `start..start + rows.len()` of the flattened list.
    pub rows: Vec<ListRow>,
    pub start: usize,
    pub selected: usize,
    /// Length of the whole flattened list.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub entry: ListEntry,
    /// Resolved enrichment for pull-request records.
    pub status: Option<PrStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub id: String,
    pub subject: SubjectBody,
    pub items: Vec<TimelineItem>,
    pub has_more: bool,
    pub estimated_total_lines: usize,
}

/// All events the engine pushes to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Refreshing {
        force_full: bool,
    },
    ListChanged(ListView),
    /// `status` is `None` when the fetch failed and the entry was dropped.
    EnrichmentChanged {
        id: String,
        status: Option<PrStatus>,
    },

    DetailLoading {
        id: String,
    },
    DetailLoaded(DetailView),
    DetailAppended {
        id: String,
        items: Vec<TimelineItem>,
        has_more: bool,
        estimated_total_lines: usize,
    },
    DetailClosed,

    /// Unified error event for fetch failures.
    FetchFailed {
        context: String,
        message: String,
    },
    /// An optimistic mutation was rolled back.
    MutationFailed {
        description: String,
        message: String,
    },
    ErrorDismissed,
    /// The credential was rejected. It has been cleared and the session is
    /// over.
    AuthInvalid {
        message: String,
    },
}
