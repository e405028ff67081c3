//! Page-following loop shared by the notification list, comment sources and
//! event sources.

use std::future::Future;

use crate::error::FetchError;

/// Hard stop for sources that never signal the end.
pub const MAX_PAGES: u32 = 1000;

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Explicit continuation marker. `None` when the source sent none, in
    /// which case a page shorter than the page size ends the loop.
    pub has_next: Option<bool>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, has_next: Option<bool>) -> Self {
        Self { items, has_next }
    }

    fn is_last(&self, page_size: usize) -> bool {
        if self.items.is_empty() {
            return true;
        }
        match self.has_next {
            Some(more) => !more,
            None => self.items.len() < page_size,
        }
    }
}

/// Read the continuation marker out of an HTTP `Link` header.
///
/// No header at all means no marker; a header without `rel="next"` means this
/// is the last page.
pub fn has_next_from_link(link: Option<&str>) -> Option<bool> {
    let link = link?;
    Some(
        link.split(',')
            .any(|part| part.split(';').skip(1).any(|p| p.trim() == r#"rel="next""#)),
    )
}

/// Fetch pages numbered from 1 until the source is exhausted and concatenate
/// them first-page-first.
///
/// Any page failure aborts the whole run; nothing is retried here.
pub async fn paginate<T, F, Fut>(page_size: usize, mut fetch_page: F) -> Result<Vec<T>, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, FetchError>>,
{
    let mut out = Vec::new();
    for page_number in 1..=MAX_PAGES {
        let page = fetch_page(page_number).await?;
        let last = page.is_last(page_size);
        out.extend(page.items);
        if last {
            return Ok(out);
        }
    }
    tracing::warn!("paginate: stopped after {MAX_PAGES} pages");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn numbers(page: u32, len: usize) -> Vec<u32> {
        (0..len).map(|i| page * 100 + u32::try_from(i).unwrap()).collect()
    }

    #[tokio::test]
    async fn short_page_ends_without_marker() {
        let calls = Cell::new(0);
        let all = paginate(3, |page| {
            calls.set(calls.get() + 1);
            let len = if page < 3 { 3 } else { 1 };
            async move { Ok(Page::new(numbers(page, len), None)) }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(all, vec![100, 101, 102, 200, 201, 202, 300]);
    }

    #[tokio::test]
    async fn explicit_marker_beats_short_page() {
        // A short page that still says "more" keeps the loop going.
        let all = paginate(50, |page| async move {
            Ok(Page::new(numbers(page, 2), Some(page < 2)))
        })
        .await
        .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn empty_page_stops_even_if_marker_says_more() {
        let calls = Cell::new(0);
        let all: Vec<u32> = paginate(10, |_| {
            calls.set(calls.get() + 1);
            async { Ok(Page::new(Vec::new(), Some(true))) }
        })
        .await
        .unwrap();
        assert!(all.is_empty());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn page_failure_propagates() {
        let result: Result<Vec<u32>, _> = paginate(1, |page| async move {
            if page == 2 {
                Err(FetchError::Transient("boom".to_owned()))
            } else {
                Ok(Page::new(numbers(page, 1), None))
            }
        })
        .await;
        assert_eq!(result, Err(FetchError::Transient("boom".to_owned())));
    }

    #[test]
    fn link_header_parsing() {
        let link = r#"<https://api.github.com/notifications?page=2>; rel="next", <https://api.github.com/notifications?page=5>; rel="last""#;
        assert_eq!(has_next_from_link(Some(link)), Some(true));
        let last = r#"<https://api.github.com/notifications?page=1>; rel="prev", <https://api.github.com/notifications?page=1>; rel="first""#;
        assert_eq!(has_next_from_link(Some(last)), Some(false));
        assert_eq!(has_next_from_link(None), None);
    }
}
