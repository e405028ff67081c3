//! Detail timeline for one notification: comments and lifecycle events from
//! every source the subject type has, merged newest first and revealed in
//! fixed-size chunks.

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::github::client::{GitHubApi, Transport};
use crate::github::detail;
use crate::types::{Notification, SubjectBody, SubjectType, TimelineItem};

pub const DEFAULT_CHUNK_SIZE: usize = 30;

/// Position of the first item not yet revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoreCursor(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reveal {
    /// The items that were just revealed, in display order.
    Appended(Vec<TimelineItem>),
    Exhausted,
}

/// Everything fetched for a subject, before chunking. This is what the
/// response cache holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledTimeline {
    pub subject: SubjectBody,
    pub items: Vec<TimelineItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    subject: SubjectBody,
    items: Vec<TimelineItem>,
    more: Option<MoreCursor>,
    chunk_size: usize,
    rendered_lines: usize,
    total_comments: usize,
    revealed_comments: usize,
    revealed_comment_lines: usize,
}

/// Stable sort newest first; items with equal timestamps keep fetch order.
pub fn merge_items(comments: Vec<TimelineItem>, events: Vec<TimelineItem>) -> Vec<TimelineItem> {
    let mut items = comments;
    items.extend(events);
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    items
}

impl Timeline {
    /// Build a timeline from merged items and reveal the first chunk.
    pub fn new(subject: SubjectBody, items: Vec<TimelineItem>, chunk_size: usize) -> Self {
        let total_comments = items.iter().filter(|i| i.is_comment()).count();
        let mut timeline = Self {
            rendered_lines: subject.rendered_lines(),
            subject,
            items,
            more: Some(MoreCursor(0)),
            chunk_size: chunk_size.max(1),
            total_comments,
            revealed_comments: 0,
            revealed_comment_lines: 0,
        };
        timeline.reveal_more();
        timeline
    }

    pub fn subject(&self) -> &SubjectBody {
        &self.subject
    }

    pub fn revealed(&self) -> &[TimelineItem] {
        let end = self.more.map_or(self.items.len(), |MoreCursor(idx)| idx);
        &self.items[..end]
    }

    pub fn has_more(&self) -> bool {
        self.more.is_some()
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    pub fn rendered_lines(&self) -> usize {
        self.rendered_lines
    }

    /// Pop the next chunk off the cursor. Once everything is revealed the
    /// cursor is gone and further calls report `Exhausted`.
    pub fn reveal_more(&mut self) -> Reveal {
        let Some(MoreCursor(start)) = self.more else {
            return Reveal::Exhausted;
        };
        let end = (start + self.chunk_size).min(self.items.len());
        let chunk = self.items[start..end].to_vec();

        for item in &chunk {
            self.rendered_lines += item.rendered_lines();
            if item.is_comment() {
                self.revealed_comments += 1;
                self.revealed_comment_lines += item.body_lines();
            }
        }
        self.more = (end < self.items.len()).then_some(MoreCursor(end));

        if chunk.is_empty() {
            Reveal::Exhausted
        } else {
            Reveal::Appended(chunk)
        }
    }

    /// Cumulative mean of body lines over revealed comments, rounded up.
    pub fn average_comment_lines(&self) -> usize {
        if self.revealed_comments == 0 {
            0
        } else {
            self.revealed_comment_lines.div_ceil(self.revealed_comments)
        }
    }

    pub fn unrevealed_comments(&self) -> usize {
        self.total_comments - self.revealed_comments
    }

    /// Rendered lines plus a guess for the comments still behind the cursor.
    pub fn estimated_total_lines(&self) -> usize {
        self.rendered_lines + self.unrevealed_comments() * self.average_comment_lines()
    }

    /// Whether the reader is within two viewports of the end of the revealed
    /// content while more items remain.
    pub fn should_prefetch(&self, offset: usize, viewport: usize) -> bool {
        if !self.has_more() {
            return false;
        }
        let below = self.rendered_lines.saturating_sub(offset + viewport);
        below < viewport * 2
    }

    /// Scroll position as a percentage of the estimated length.
    pub fn scroll_percentage(&self, offset: usize, viewport: usize) -> u8 {
        let total = self.estimated_total_lines();
        if total <= viewport {
            return 100;
        }
        let pct = (offset * 100) / (total - viewport).max(1);
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

async fn fetch_assembled<T: Transport>(
    api: &GitHubApi<T>,
    notification: &Notification,
    subject_url: &str,
) -> Result<AssembledTimeline, FetchError> {
    let subject = detail::fetch_subject(api, subject_url).await?;
    let kind = &notification.subject.kind;

    let comments = async {
        let mut comments = match kind {
            SubjectType::Discussion => match subject.number.or_else(|| trailing_number(subject_url)) {
                Some(number) => {
                    let repo = &notification.repository;
                    detail::fetch_discussion_comments(api, &repo.owner, &repo.name, number).await?
                }
                None => Vec::new(),
            },
            _ => match subject.comments_url.as_deref() {
                Some(url) => detail::fetch_comments(api, url).await?,
                None => Vec::new(),
            },
        };
        if *kind == SubjectType::PullRequest
            && let Some(url) = subject.review_comments_url.as_deref()
        {
            comments.extend(detail::fetch_review_comments(api, url).await?);
        }
        Ok::<_, FetchError>(comments)
    };

    let events = async {
        if matches!(kind, SubjectType::Issue | SubjectType::PullRequest) {
            detail::fetch_events(api, subject_url).await
        } else {
            Ok(Vec::new())
        }
    };

    let (comments, events) = tokio::try_join!(comments, events)?;
    Ok(AssembledTimeline {
        items: merge_items(comments, events),
        subject,
    })
}

fn trailing_number(url: &str) -> Option<u64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Fetch, merge and chunk the timeline for `notification`.
///
/// Assembled results are cached per subject URL for the lifetime of the
/// client's response cache.
pub async fn assemble<T: Transport>(
    api: &GitHubApi<T>,
    notification: &Notification,
    chunk_size: usize,
) -> Result<Timeline, FetchError> {
    let Some(subject_url) = notification.subject.url.as_deref() else {
        let subject = SubjectBody {
            title: notification.subject.title.clone(),
            state: None,
            merged: false,
            body: String::new(),
            number: None,
            comments_url: None,
            review_comments_url: None,
            html_url: None,
        };
        return Ok(Timeline::new(subject, Vec::new(), chunk_size));
    };

    let cache = api.cache();
    let cache_key = format!("timeline:{subject_url}");
    if let Some(cached) = cache.get(&cache_key).await
        && let Ok(assembled) = serde_json::from_str::<AssembledTimeline>(&cached)
    {
        tracing::debug!("cache hit for {cache_key}");
        return Ok(Timeline::new(assembled.subject, assembled.items, chunk_size));
    }

    let assembled = fetch_assembled(api, notification, subject_url).await?;
    if let Ok(json) = serde_json::to_string(&assembled) {
        cache.insert(cache_key, json).await;
    }
    Ok(Timeline::new(assembled.subject, assembled.items, chunk_size))
}
