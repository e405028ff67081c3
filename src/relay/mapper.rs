use serde::{Deserialize, Serialize};

use crate::types::{Notification, Reason, SubjectType};

/// Toast severity understood by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Info,
    Success,
    Warning,
    Error,
}

impl Status {
    pub fn for_reason(reason: &Reason) -> Self {
        match reason {
            Reason::SecurityAlert => Self::Error,
            Reason::ReviewRequested | Reason::Assign | Reason::Mention | Reason::TeamMention => {
                Self::Warning
            }
            Reason::StateChange | Reason::Author => Self::Success,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayAction {
    pub label: String,
    pub url: String,
    pub open: bool,
}

/// Body of `POST {url}/notify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPayload {
    pub source: String,
    pub title: String,
    pub message: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<RelayAction>,
}

pub const TOAST_DURATION_SECS: u32 = 8;

/// Whether the notification survives the org and repo exclude lists.
pub fn should_forward(notification: &Notification, exclude_orgs: &[String], exclude_repos: &[String]) -> bool {
    let repo = notification.repository.full_name();
    let org = &notification.repository.owner;
    !exclude_repos.contains(&repo) && !exclude_orgs.contains(org)
}

pub fn map_notification(notification: &Notification, source: &str) -> RelayPayload {
    let repo = notification.repository.full_name();
    let label = match notification.subject.kind {
        SubjectType::PullRequest => "Open PR",
        SubjectType::Issue => "Open Issue",
        _ => "Open",
    };

    RelayPayload {
        source: source.to_owned(),
        title: format!("[{repo}] {}", notification.subject.title),
        message: format!(
            "{} on {} in {repo}",
            notification.reason.label(),
            notification.subject.kind.display_name()
        ),
        status: Status::for_reason(&notification.reason),
        icon_href: Some(format!(
            "https://github.com/{}.png?size=64",
            notification.repository.owner
        )),
        duration: Some(TOAST_DURATION_SECS),
        actions: vec![RelayAction {
            label: label.to_owned(),
            url: notification.web_url(),
            open: true,
        }],
    }
}
