//! Bounded-concurrency background fetches that annotate visible records.
//!
//! The queue itself never blocks: fetches run as Tokio tasks and report back
//! through a channel that the owning loop drains, calling
//! [`EnrichmentQueue::complete`] for every outcome.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::error::FetchError;

pub const DEFAULT_CONCURRENCY: usize = 4;

pub type EnrichFuture<V> = Pin<Box<dyn Future<Output = Result<V, FetchError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentEntry<V> {
    Pending,
    Resolved(V),
}

/// Result of one fetch, tagged with the generation it was started in.
#[derive(Debug)]
pub struct EnrichmentOutcome<V> {
    pub id: String,
    pub generation: u64,
    pub result: Result<V, FetchError>,
}

pub struct EnrichmentQueue<V> {
    entries: HashMap<String, EnrichmentEntry<V>>,
    waiting: VecDeque<(String, EnrichFuture<V>)>,
    in_flight: usize,
    concurrency: usize,
    timeout: Duration,
    generation: u64,
    outcome_tx: UnboundedSender<EnrichmentOutcome<V>>,
}

impl<V: Send + 'static> EnrichmentQueue<V> {
    /// Create a queue and the receiver its outcomes arrive on.
    pub fn new(concurrency: usize, timeout: Duration) -> (Self, UnboundedReceiver<EnrichmentOutcome<V>>) {
        let (outcome_tx, outcome_rx) = unbounded_channel();
        let queue = Self {
            entries: HashMap::new(),
            waiting: VecDeque::new(),
            in_flight: 0,
            concurrency: concurrency.max(1),
            timeout,
            generation: 0,
            outcome_tx,
        };
        (queue, outcome_rx)
    }

    pub fn get(&self, id: &str) -> Option<&EnrichmentEntry<V>> {
        self.entries.get(id)
    }

    pub fn resolved(&self, id: &str) -> Option<&V> {
        match self.entries.get(id)? {
            EnrichmentEntry::Resolved(v) => Some(v),
            EnrichmentEntry::Pending => None,
        }
    }

    pub fn is_pending(&self, id: &str) -> bool {
        matches!(self.entries.get(id), Some(EnrichmentEntry::Pending))
    }

    pub fn entries(&self) -> &HashMap<String, EnrichmentEntry<V>> {
        &self.entries
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Schedule `fetch` for `id` unless an entry (pending or resolved)
    /// already exists. `fetch` is only invoked when the request is accepted.
    /// Returns whether it was.
    pub fn enqueue_if_absent<F>(&mut self, id: &str, fetch: F) -> bool
    where
        F: FnOnce() -> EnrichFuture<V>,
    {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.to_owned(), EnrichmentEntry::Pending);
        self.waiting.push_back((id.to_owned(), fetch()));
        self.pump();
        true
    }

    /// Start waiting fetches until the concurrency limit is reached.
    fn pump(&mut self) {
        while self.in_flight < self.concurrency {
            let Some((id, fetch)) = self.waiting.pop_front() else {
                break;
            };
            self.in_flight += 1;
            let tx = self.outcome_tx.clone();
            let generation = self.generation;
            let timeout = self.timeout;
            tokio::spawn(async move {
                let result = match tokio::time::timeout(timeout, fetch).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::TimedOut(timeout)),
                };
                let _ = tx.send(EnrichmentOutcome {
                    id,
                    generation,
                    result,
                });
            });
        }
    }

    /// Apply a finished fetch. Success installs the value; failure removes
    /// the entry so the id can be enqueued again. Outcomes from before the
    /// last [`drain`](Self::drain) only free their slot.
    ///
    /// Returns whether the entry map changed.
    pub fn complete(&mut self, outcome: EnrichmentOutcome<V>) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        let changed = if outcome.generation == self.generation {
            match outcome.result {
                Ok(value) => {
                    self.entries.insert(outcome.id, EnrichmentEntry::Resolved(value));
                    true
                }
                Err(e) => {
                    tracing::debug!("enrichment: {} failed: {e}", outcome.id);
                    self.entries.remove(&outcome.id).is_some()
                }
            }
        } else {
            false
        };
        self.pump();
        changed
    }

    /// Drop waiting fetches and every entry; results of fetches already in
    /// flight are discarded when they arrive.
    pub fn drain(&mut self) {
        self.waiting.clear();
        self.entries.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn never() -> EnrichFuture<u32> {
        Box::pin(std::future::pending())
    }

    fn ready(v: Result<u32, FetchError>) -> EnrichFuture<u32> {
        Box::pin(async move { v })
    }

    #[tokio::test]
    async fn duplicate_enqueue_fetches_once() {
        let (mut queue, mut rx) = EnrichmentQueue::new(4, Duration::from_secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            queue.enqueue_if_absent("pr-1", move || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Ok(7))
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(queue.is_pending("pr-1"));

        let outcome = rx.recv().await.unwrap();
        assert!(queue.complete(outcome));
        assert_eq!(queue.resolved("pr-1"), Some(&7));

        // Resolved entries also suppress new fetches.
        assert!(!queue.enqueue_if_absent("pr-1", || ready(Ok(8))));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let (mut queue, _rx) = EnrichmentQueue::<u32>::new(4, Duration::from_secs(60));
        for i in 0..6 {
            queue.enqueue_if_absent(&i.to_string(), never);
        }
        assert_eq!(queue.in_flight(), 4);
        assert_eq!(queue.waiting(), 2);

        // A finished slot lets the next waiting fetch start.
        queue.complete(EnrichmentOutcome {
            id: "0".to_owned(),
            generation: 0,
            result: Ok(1),
        });
        assert_eq!(queue.in_flight(), 4);
        assert_eq!(queue.waiting(), 1);
    }

    #[tokio::test]
    async fn failure_clears_entry_for_retry() {
        let (mut queue, mut rx) = EnrichmentQueue::new(4, Duration::from_secs(5));
        queue.enqueue_if_absent("x", || ready(Err(FetchError::Transient("down".to_owned()))));
        let outcome = rx.recv().await.unwrap();
        assert!(queue.complete(outcome));
        assert!(queue.get("x").is_none());
        assert!(queue.enqueue_if_absent("x", || ready(Ok(1))));
    }

    #[tokio::test]
    async fn hung_fetch_times_out() {
        let (mut queue, mut rx) = EnrichmentQueue::<u32>::new(1, Duration::from_millis(20));
        queue.enqueue_if_absent("slow", never);
        let outcome = rx.recv().await.unwrap();
        assert!(matches!(outcome.result, Err(FetchError::TimedOut(_))));
        queue.complete(outcome);
        assert!(queue.get("slow").is_none());
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn drained_results_are_discarded() {
        let (mut queue, mut rx) = EnrichmentQueue::new(1, Duration::from_secs(5));
        queue.enqueue_if_absent("a", || ready(Ok(1)));
        queue.enqueue_if_absent("b", || ready(Ok(2)));
        assert_eq!(queue.waiting(), 1);

        queue.drain();
        assert_eq!(queue.waiting(), 0);
        assert!(queue.entries().is_empty());

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.id, "a");
        assert!(!queue.complete(outcome));
        assert!(queue.get("a").is_none());
        assert_eq!(queue.in_flight(), 0);
    }
}
