use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timeline events
// ---------------------------------------------------------------------------

/// Event kinds that only record who is watching the thread. They are dropped
/// before the timeline is merged.
pub const INFORMATIONAL_EVENTS: &[&str] = &["subscribed", "unsubscribed", "mentioned"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Assigned { assignee: String },
    Unassigned { assignee: String },
    Labeled { label: String },
    Unlabeled { label: String },
    Locked,
    Unlocked,
    Milestoned,
    Demilestoned,
    Pinned,
    Unpinned,
    Closed,
    Reopened,
    ReviewRequested { reviewer: String },
    ReviewRequestRemoved { reviewer: String },
    Other(String),
}

impl EventKind {
    /// Human sentence for this event performed by `actor`.
    pub fn describe(&self, actor: &str) -> String {
        match self {
            Self::Assigned { assignee } => format!("@{actor} assigned @{assignee}"),
            Self::Unassigned { assignee } => format!("@{actor} unassigned @{assignee}"),
            Self::Labeled { label } => format!("@{actor} added label {label}"),
            Self::Unlabeled { label } => format!("@{actor} removed label {label}"),
            Self::Locked => format!("@{actor} locked this conversation"),
            Self::Unlocked => format!("@{actor} unlocked this conversation"),
            Self::Milestoned => format!("@{actor} added this to a milestone"),
            Self::Demilestoned => format!("@{actor} removed this from a milestone"),
            Self::Pinned => format!("@{actor} pinned this issue"),
            Self::Unpinned => format!("@{actor} unpinned this issue"),
            Self::Closed => format!("@{actor} closed this"),
            Self::Reopened => format!("@{actor} reopened this"),
            Self::ReviewRequested { reviewer } => {
                format!("@{actor} requested review from @{reviewer}")
            }
            Self::ReviewRequestRemoved { reviewer } => {
                format!("@{actor} removed review request from @{reviewer}")
            }
            Self::Other(raw) => format!("@{actor} {}", raw.replace('_', " ")),
        }
    }
}

// ---------------------------------------------------------------------------
// Timeline items
// ---------------------------------------------------------------------------

/// File/line a pull-request review comment is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeContext {
    pub path: String,
    pub line: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineItem {
    Comment {
        author: String,
        body: String,
        created_at: DateTime<Utc>,
        context: Option<CodeContext>,
    },
    Event {
        actor: String,
        kind: EventKind,
        created_at: DateTime<Utc>,
    },
}

impl TimelineItem {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Comment { created_at, .. } | Self::Event { created_at, .. } => *created_at,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Self::Comment { .. })
    }

    /// Number of lines in a comment body; zero for events.
    pub fn body_lines(&self) -> usize {
        match self {
            Self::Comment { body, .. } => body.split('\n').count(),
            Self::Event { .. } => 0,
        }
    }

    /// Lines this item occupies once rendered in the detail view.
    ///
    /// A comment is a heading, a blank line, its body, a blank line and a
    /// separator; review comments carry one extra context line. An event is a
    /// single quoted line followed by a blank line.
    pub fn rendered_lines(&self) -> usize {
        match self {
            Self::Comment { context, .. } => {
                4 + self.body_lines() + usize::from(context.is_some())
            }
            Self::Event { .. } => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Subject body
// ---------------------------------------------------------------------------

/// Primary body of the subject a notification points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectBody {
    pub title: String,
    pub state: Option<String>,
    pub merged: bool,
    pub body: String,
    pub number: Option<u64>,
    pub comments_url: Option<String>,
    pub review_comments_url: Option<String>,
    pub html_url: Option<String>,
}

impl SubjectBody {
    /// Lines the header section occupies once rendered: title, blank, body,
    /// blank.
    pub fn rendered_lines(&self) -> usize {
        3 + self.body.split('\n').count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_known_events() {
        let kind = EventKind::Labeled {
            label: "bug".to_owned(),
        };
        assert_eq!(kind.describe("alice"), "@alice added label bug");
        let kind = EventKind::ReviewRequested {
            reviewer: "bob".to_owned(),
        };
        assert_eq!(kind.describe("alice"), "@alice requested review from @bob");
        assert_eq!(EventKind::Closed.describe("carol"), "@carol closed this");
    }

    #[test]
    fn describe_unknown_event_uses_raw_name() {
        let kind = EventKind::Other("head_ref_force_pushed".to_owned());
        assert_eq!(kind.describe("dave"), "@dave head ref force pushed");
    }

    #[test]
    fn rendered_lines_per_item() {
        let comment = TimelineItem::Comment {
            author: "a".to_owned(),
            body: "one\ntwo\nthree".to_owned(),
            created_at: DateTime::UNIX_EPOCH,
            context: None,
        };
        assert_eq!(comment.body_lines(), 3);
        assert_eq!(comment.rendered_lines(), 7);

        let event = TimelineItem::Event {
            actor: "a".to_owned(),
            kind: EventKind::Locked,
            created_at: DateTime::UNIX_EPOCH,
        };
        assert_eq!(event.body_lines(), 0);
        assert_eq!(event.rendered_lines(), 2);
    }
}
