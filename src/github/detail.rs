use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::FetchError;
use crate::github::client::{GitHubApi, Transport};
use crate::paginate::{Page, has_next_from_link, paginate};
use crate::types::{CodeContext, EventKind, INFORMATIONAL_EVENTS, SubjectBody, TimelineItem};

/// Page size for comment and event sources.
const DETAIL_PAGE_SIZE: u8 = 100;

const GHOST: &str = "ghost";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

fn login(user: Option<RawUser>) -> String {
    user.map_or_else(|| GHOST.to_owned(), |u| u.login)
}

#[derive(Debug, Deserialize)]
struct RawSubjectBody {
    #[serde(default)]
    title: Option<String>,
    /// Releases carry `name` instead of `title`.
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    comments_url: Option<String>,
    #[serde(default)]
    review_comments_url: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    #[serde(default)]
    body: Option<String>,
    user: Option<RawUser>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawReviewComment {
    path: String,
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    body: Option<String>,
    user: Option<RawUser>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    event: String,
    actor: Option<RawUser>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    label: Option<RawLabel>,
    #[serde(default)]
    assignee: Option<RawUser>,
    #[serde(default)]
    requested_reviewer: Option<RawUser>,
}

impl RawEvent {
    fn kind(self) -> EventKind {
        let ghost = || login(None);
        match self.event.as_str() {
            "assigned" => EventKind::Assigned {
                assignee: self.assignee.map_or_else(ghost, |u| u.login),
            },
            "unassigned" => EventKind::Unassigned {
                assignee: self.assignee.map_or_else(ghost, |u| u.login),
            },
            "labeled" => EventKind::Labeled {
                label: self.label.map(|l| l.name).unwrap_or_default(),
            },
            "unlabeled" => EventKind::Unlabeled {
                label: self.label.map(|l| l.name).unwrap_or_default(),
            },
            "locked" => EventKind::Locked,
            "unlocked" => EventKind::Unlocked,
            "milestoned" => EventKind::Milestoned,
            "demilestoned" => EventKind::Demilestoned,
            "pinned" => EventKind::Pinned,
            "unpinned" => EventKind::Unpinned,
            "closed" => EventKind::Closed,
            "reopened" => EventKind::Reopened,
            "review_requested" => EventKind::ReviewRequested {
                reviewer: self.requested_reviewer.map_or_else(ghost, |u| u.login),
            },
            "review_request_removed" => EventKind::ReviewRequestRemoved {
                reviewer: self.requested_reviewer.map_or_else(ghost, |u| u.login),
            },
            other => EventKind::Other(other.to_owned()),
        }
    }
}

// GraphQL discussion comments

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscussionComment {
    author: Option<RawUser>,
    #[serde(default)]
    body: String,
    created_at: DateTime<Utc>,
}

const DISCUSSION_COMMENTS_QUERY: &str = r"
query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    discussion(number: $number) {
      comments(first: 100) {
        nodes { author { login } body createdAt }
      }
    }
  }
}";

// ---------------------------------------------------------------------------
// Fetchers
// ---------------------------------------------------------------------------

fn with_page(url: &str, page: u32) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}per_page={DETAIL_PAGE_SIZE}&page={page}")
}

/// Follow every page of a REST list endpoint.
async fn fetch_all<T: Transport, D: DeserializeOwned>(
    api: &GitHubApi<T>,
    url: &str,
) -> Result<Vec<D>, FetchError> {
    paginate(usize::from(DETAIL_PAGE_SIZE), |page| {
        let page_url = with_page(url, page);
        async move {
            let response = api.get(&page_url).await?;
            let items: Vec<D> = response.json()?;
            Ok(Page::new(items, has_next_from_link(response.link.as_deref())))
        }
    })
    .await
}

/// GET the subject itself (issue, pull request, release, discussion).
pub async fn fetch_subject<T: Transport>(
    api: &GitHubApi<T>,
    subject_url: &str,
) -> Result<SubjectBody, FetchError> {
    let raw: RawSubjectBody = api.get_json(subject_url).await?;
    Ok(SubjectBody {
        title: raw.title.or(raw.name).unwrap_or_default(),
        state: raw.state,
        merged: raw.merged,
        body: raw.body.unwrap_or_default(),
        number: raw.number,
        comments_url: raw.comments_url,
        review_comments_url: raw.review_comments_url,
        html_url: raw.html_url,
    })
}

/// Issue-style comments (also used for the conversation tab of a PR).
pub async fn fetch_comments<T: Transport>(
    api: &GitHubApi<T>,
    comments_url: &str,
) -> Result<Vec<TimelineItem>, FetchError> {
    let raw: Vec<RawComment> = fetch_all(api, comments_url).await?;
    Ok(raw
        .into_iter()
        .map(|c| TimelineItem::Comment {
            author: login(c.user),
            body: c.body.unwrap_or_default(),
            created_at: c.created_at,
            context: None,
        })
        .collect())
}

/// Pull-request review comments, tagged with the file and line they target.
pub async fn fetch_review_comments<T: Transport>(
    api: &GitHubApi<T>,
    review_comments_url: &str,
) -> Result<Vec<TimelineItem>, FetchError> {
    let raw: Vec<RawReviewComment> = fetch_all(api, review_comments_url).await?;
    Ok(raw
        .into_iter()
        .map(|c| TimelineItem::Comment {
            author: login(c.user),
            body: c.body.unwrap_or_default(),
            created_at: c.created_at,
            context: Some(CodeContext {
                path: c.path,
                line: c.line,
            }),
        })
        .collect())
}

/// Events endpoint for an issue or pull-request subject URL.
///
/// Pull requests share the issue events feed, so `/pulls/{n}` is mapped to
/// `/issues/{n}/events`.
pub fn events_url(subject_url: &str) -> String {
    let base = subject_url.trim_end_matches('/').replacen("/pulls/", "/issues/", 1);
    format!("{base}/events")
}

/// Lifecycle events, minus the purely informational kinds. A missing events
/// feed (404) yields no events.
pub async fn fetch_events<T: Transport>(
    api: &GitHubApi<T>,
    subject_url: &str,
) -> Result<Vec<TimelineItem>, FetchError> {
    let raw: Vec<RawEvent> = match fetch_all(api, &events_url(subject_url)).await {
        Ok(raw) => raw,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e),
    };
    Ok(raw
        .into_iter()
        .filter(|e| !INFORMATIONAL_EVENTS.contains(&e.event.as_str()))
        .map(|mut e| {
            let created_at = e.created_at;
            let actor = login(e.actor.take());
            TimelineItem::Event {
                actor,
                kind: e.kind(),
                created_at,
            }
        })
        .collect())
}

/// Discussion comments come from one GraphQL query (first 100 comments).
pub async fn fetch_discussion_comments<T: Transport>(
    api: &GitHubApi<T>,
    owner: &str,
    repo: &str,
    number: u64,
) -> Result<Vec<TimelineItem>, FetchError> {
    let payload = serde_json::json!({
        "query": DISCUSSION_COMMENTS_QUERY,
        "variables": { "owner": owner, "repo": repo, "number": number },
    });
    let response = api.transport().graphql(&payload).await?;

    if let Some(errors) = response.get("errors").filter(|e| !e.is_null()) {
        let errors: Vec<GraphQLError> = serde_json::from_value(errors.clone())?;
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        let joined = messages.join("; ");
        if joined.to_lowercase().contains("rate limit") {
            return Err(FetchError::from_fetch_status(StatusCode::TOO_MANY_REQUESTS, &joined));
        }
        return Err(FetchError::Malformed(format!("GraphQL errors: {joined}")));
    }

    let nodes = response
        .pointer("/data/repository/discussion/comments/nodes")
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));
    let comments: Vec<DiscussionComment> = serde_json::from_value(nodes)?;
    Ok(comments
        .into_iter()
        .map(|c| TimelineItem::Comment {
            author: login(c.author),
            body: c.body,
            created_at: c.created_at,
            context: None,
        })
        .collect())
}
