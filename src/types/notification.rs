use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::RepoRef;

// ---------------------------------------------------------------------------
// Notification-specific enums
// ---------------------------------------------------------------------------

/// Why the user received a notification.
///
/// Unknown values are kept verbatim so labels and persisted snapshots never
/// lose information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Reason {
    ApprovalRequested,
    Assign,
    Author,
    CiActivity,
    Comment,
    Invitation,
    Manual,
    Mention,
    ReviewRequested,
    SecurityAlert,
    StateChange,
    Subscribed,
    TeamMention,
    Other(String),
}

impl Reason {
    pub fn parse(s: &str) -> Self {
        match s {
            "approval_requested" => Self::ApprovalRequested,
            "assign" => Self::Assign,
            "author" => Self::Author,
            "ci_activity" => Self::CiActivity,
            "comment" => Self::Comment,
            "invitation" => Self::Invitation,
            "manual" => Self::Manual,
            "mention" => Self::Mention,
            "review_requested" => Self::ReviewRequested,
            "security_alert" => Self::SecurityAlert,
            "state_change" => Self::StateChange,
            "subscribed" => Self::Subscribed,
            "team_mention" => Self::TeamMention,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The reason as the REST API spells it.
    pub fn as_api_str(&self) -> &str {
        match self {
            Self::ApprovalRequested => "approval_requested",
            Self::Assign => "assign",
            Self::Author => "author",
            Self::CiActivity => "ci_activity",
            Self::Comment => "comment",
            Self::Invitation => "invitation",
            Self::Manual => "manual",
            Self::Mention => "mention",
            Self::ReviewRequested => "review_requested",
            Self::SecurityAlert => "security_alert",
            Self::StateChange => "state_change",
            Self::Subscribed => "subscribed",
            Self::TeamMention => "team_mention",
            Self::Other(s) => s,
        }
    }

    /// Human label shown next to a notification.
    pub fn label(&self) -> String {
        match self {
            Self::Assign => "assigned".to_owned(),
            Self::Author => "you created".to_owned(),
            Self::Comment => "new comment".to_owned(),
            Self::Invitation => "invited".to_owned(),
            Self::Manual => "subscribed".to_owned(),
            Self::Mention => "mentioned".to_owned(),
            Self::ReviewRequested => "review requested".to_owned(),
            Self::SecurityAlert => "security alert".to_owned(),
            Self::StateChange => "state changed".to_owned(),
            Self::Subscribed => "watching".to_owned(),
            Self::TeamMention => "team mentioned".to_owned(),
            other => other.as_api_str().replace('_', " "),
        }
    }
}

impl From<String> for Reason {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Reason> for String {
    fn from(r: Reason) -> Self {
        r.as_api_str().to_owned()
    }
}

/// What kind of object a notification thread is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubjectType {
    PullRequest,
    Issue,
    Discussion,
    Release,
    Commit,
    CheckSuite,
    Other(String),
}

impl SubjectType {
    pub fn parse(s: &str) -> Self {
        match s {
            "PullRequest" => Self::PullRequest,
            "Issue" => Self::Issue,
            "Discussion" => Self::Discussion,
            "Release" => Self::Release,
            "Commit" => Self::Commit,
            "CheckSuite" => Self::CheckSuite,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_api_str(&self) -> &str {
        match self {
            Self::PullRequest => "PullRequest",
            Self::Issue => "Issue",
            Self::Discussion => "Discussion",
            Self::Release => "Release",
            Self::Commit => "Commit",
            Self::CheckSuite => "CheckSuite",
            Self::Other(s) => s,
        }
    }

    /// `"PullRequest"` → `"pull request"`, `"Issue"` → `"issue"`.
    pub fn display_name(&self) -> String {
        let mut out = String::new();
        for ch in self.as_api_str().chars() {
            if ch.is_uppercase() && !out.is_empty() {
                out.push(' ');
            }
            out.extend(ch.to_lowercase());
        }
        out
    }
}

impl From<String> for SubjectType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<SubjectType> for String {
    fn from(t: SubjectType) -> Self {
        t.as_api_str().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Notification domain type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub title: String,
    pub kind: SubjectType,
    /// Canonical API locator of the subject; absent for some subject kinds.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub latest_comment_url: Option<String>,
}

/// One notification thread. Immutable once fetched except for `unread`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub repository: RepoRef,
    pub updated_at: DateTime<Utc>,
    pub reason: Reason,
    pub subject: Subject,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub subscription_url: String,
}

impl Notification {
    /// Grouping key: the repository full name.
    pub fn group_key(&self) -> String {
        self.repository.full_name()
    }

    pub fn is_pull_request(&self) -> bool {
        self.subject.kind == SubjectType::PullRequest
    }

    /// Browser URL for the subject, falling back to the repository page.
    pub fn web_url(&self) -> String {
        match self.subject.url.as_deref() {
            Some(url) if !url.is_empty() => crate::url::web_url(url),
            _ => format!("https://github.com/{}", self.repository.full_name()),
        }
    }
}
