use chrono::{DateTime, SecondsFormat, Utc};
use http::Method;
use serde::Deserialize;

use crate::error::FetchError;
use crate::github::client::{GitHubApi, Transport};
use crate::paginate::{Page, has_next_from_link, paginate};
use crate::types::{Notification, Reason, RepoRef, Subject, SubjectType};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawNotification {
    id: String,
    #[serde(default)]
    unread: bool,
    reason: String,
    updated_at: DateTime<Utc>,
    subject: RawSubject,
    repository: RawRepository,
    #[serde(default)]
    subscription_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    latest_comment_url: Option<String>,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: String,
    owner: RawOwner,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

impl RawNotification {
    fn into_domain(self) -> Notification {
        Notification {
            id: self.id,
            repository: RepoRef {
                owner: self.repository.owner.login,
                name: self.repository.name,
            },
            updated_at: self.updated_at,
            reason: Reason::parse(&self.reason),
            subject: Subject {
                title: self.subject.title,
                kind: SubjectType::parse(&self.subject.kind),
                url: self.subject.url.filter(|u| !u.is_empty()),
                latest_comment_url: self.subject.latest_comment_url,
            },
            unread: self.unread,
            subscription_url: self.subscription_url.unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn notifications_page_url(api_base: &str, per_page: u8, page: u32, since: DateTime<Utc>) -> String {
    let mut url = format!(
        "{api_base}/notifications?all=false&participating=false&per_page={per_page}&page={page}"
    );
    if since > DateTime::UNIX_EPOCH {
        url.push_str("&since=");
        url.push_str(&since.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    url
}

/// Fetch every unread notification updated after `since`, following pages.
///
/// `since == UNIX_EPOCH` fetches the full list.
pub async fn fetch_notifications<T: Transport>(
    api: &GitHubApi<T>,
    since: DateTime<Utc>,
) -> Result<Vec<Notification>, FetchError> {
    let per_page = api.per_page();
    let raw = paginate(usize::from(per_page), |page| {
        let url = notifications_page_url(api.api_base(), per_page, page, since);
        async move {
            let response = api.get(&url).await?;
            let items: Vec<RawNotification> = response.json()?;
            Ok(Page::new(items, has_next_from_link(response.link.as_deref())))
        }
    })
    .await?;

    let notifications: Vec<Notification> =
        raw.into_iter().map(RawNotification::into_domain).collect();
    tracing::debug!(
        "fetched {} notifications since {}",
        notifications.len(),
        since.to_rfc3339()
    );
    Ok(notifications)
}

/// Login of the authenticated user.
pub async fn fetch_current_user<T: Transport>(api: &GitHubApi<T>) -> Result<String, FetchError> {
    let user: RawUser = api.get_json(&format!("{}/user", api.api_base())).await?;
    Ok(user.login)
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

async fn send_mutation<T: Transport>(
    api: &GitHubApi<T>,
    method: Method,
    url: &str,
) -> Result<(), FetchError> {
    let response = api.transport().request(method, url, None).await?;
    if response.status.is_success() {
        Ok(())
    } else {
        Err(FetchError::from_mutation_status(response.status, &response.body))
    }
}

/// Mark a thread as read (PATCH /notifications/threads/{id}).
pub async fn mark_thread_read<T: Transport>(api: &GitHubApi<T>, thread_id: &str) -> Result<(), FetchError> {
    let url = format!("{}/notifications/threads/{thread_id}", api.api_base());
    send_mutation(api, Method::PATCH, &url).await
}

/// Mark a thread as done (DELETE /notifications/threads/{id}).
pub async fn mark_thread_done<T: Transport>(api: &GitHubApi<T>, thread_id: &str) -> Result<(), FetchError> {
    let url = format!("{}/notifications/threads/{thread_id}", api.api_base());
    send_mutation(api, Method::DELETE, &url).await
}

/// Delete the thread subscription, using the notification's own
/// subscription URL when it has one.
pub async fn unsubscribe_thread<T: Transport>(
    api: &GitHubApi<T>,
    notification: &Notification,
) -> Result<(), FetchError> {
    let url = if notification.subscription_url.is_empty() {
        format!(
            "{}/notifications/threads/{}/subscription",
            api.api_base(),
            notification.id
        )
    } else {
        notification.subscription_url.clone()
    };
    send_mutation(api, Method::DELETE, &url).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
