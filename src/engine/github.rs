use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::cache::RecordCache;
use crate::config::types::AppConfig;
use crate::enrichment::{EnrichmentOutcome, EnrichmentQueue};
use crate::error::FetchError;
use crate::github::client::{GitHubApi, Transport};
use crate::github::{notifications as notif, pulls};
use crate::grouping::ListEntry;
use crate::mutation::{self, MutationIntent, MutationKind};
use crate::store::{KEY_GITHUB_TOKEN, Store};
use crate::timeline::{self, Reveal, Timeline};
use crate::types::{Notification, PrStatus};

use super::interface::{Engine, EngineHandle, Event, Request};
use super::refresh::RefreshScheduler;
use super::session::Session;

/// The GitHub backend engine. Generic over the transport so tests can run
/// it against canned responses.
pub struct GitHubEngine<T> {
    api: GitHubApi<T>,
    store: Box<dyn Store>,
    config: AppConfig,
}

impl<T: Transport> GitHubEngine<T> {
    pub fn new(api: GitHubApi<T>, store: Box<dyn Store>, config: AppConfig) -> Self {
        Self { api, store, config }
    }
}

impl<T: Transport> Engine for GitHubEngine<T> {
    fn start(self) -> EngineHandle {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Request>();
        let handle = EngineHandle::new(tx);
        let _ = std::thread::Builder::new()
            .name("gh-engine".to_owned())
            .spawn(move || match tokio::runtime::Runtime::new() {
                Ok(rt) => rt.block_on(self.run_loop(rx)),
                Err(e) => tracing::error!("engine: tokio runtime init failed: {e}"),
            });
        handle
    }
}

/// Results of spawned network calls, fed back into the loop.
enum Completion {
    Refreshed {
        force_full: bool,
        started_at: DateTime<Utc>,
        result: Result<Vec<Notification>, FetchError>,
    },
    Viewer(Result<String, FetchError>),
    Assembled {
        ticket: u64,
        result: Result<Timeline, FetchError>,
    },
    Confirmed(Vec<(MutationIntent, Result<(), FetchError>)>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Everything the handlers need besides the session.
struct Ctx<T> {
    api: GitHubApi<T>,
    store: Box<dyn Store>,
    config: AppConfig,
    scheduler: RefreshScheduler,
    done_tx: UnboundedSender<Completion>,
    request_timeout: Duration,
    /// The initial refresh has been started.
    started: bool,
}

impl<T: Transport> GitHubEngine<T> {
    async fn run_loop(self, mut rx: UnboundedReceiver<Request>) {
        let Self { api, store, config } = self;
        let request_timeout = Duration::from_secs(config.github.request_timeout_secs.max(1));

        let (queue, mut enrich_rx) =
            EnrichmentQueue::<PrStatus>::new(config.enrichment.concurrency, request_timeout);
        let cache = RecordCache::load(store.as_ref());
        tracing::debug!("engine: loaded {} cached notifications", cache.len());
        let mut session = Session::new(cache, config.list.window_size, queue);

        let interval_mins = u64::from(config.github.refetch_interval_minutes);
        let scheduler = RefreshScheduler::new(Duration::from_secs((interval_mins * 60).max(60)));
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel::<Completion>();
        let mut ctx = Ctx {
            api,
            store,
            config,
            scheduler,
            done_tx,
            request_timeout,
            started: false,
        };

        let tick_dur = ctx.scheduler.interval().min(Duration::from_secs(60));
        let mut refresh_tick = tokio::time::interval(tick_dur);
        // Consume the first immediate tick so refresh fires after one full interval.
        refresh_tick.tick().await;

        loop {
            let flow = tokio::select! {
                biased;
                maybe_req = rx.recv() => {
                    match maybe_req {
                        None | Some(Request::Shutdown) => {
                            tracing::debug!("engine: shutting down");
                            break;
                        }
                        Some(req) => handle_request(req, &mut session, &mut ctx),
                    }
                }
                Some(done) = done_rx.recv() => handle_completion(done, &mut session, &mut ctx),
                Some(outcome) = enrich_rx.recv() => {
                    handle_enrichment(outcome, &mut session);
                    Flow::Continue
                }
                _ = refresh_tick.tick() => {
                    if ctx.scheduler.is_due() {
                        start_refresh(false, &mut session, &mut ctx);
                    }
                    Flow::Continue
                }
            };
            if flow == Flow::Stop {
                break;
            }
        }
        session.enrichment.drain();
    }
}

// ---------------------------------------------------------------------------
// Request dispatch
// ---------------------------------------------------------------------------

fn handle_request<T: Transport>(req: Request, session: &mut Session, ctx: &mut Ctx<T>) -> Flow {
    match req {
        Request::Subscribe { notify_tx } => {
            session.subscribe(notify_tx);
            session.publish_list();
            if !ctx.started {
                ctx.started = true;
                start_refresh(false, session, ctx);
            }
        }
        Request::Refresh { force_full } => start_refresh(force_full, session, ctx),

        // --- Navigation ---
        Request::Navigate(motion) => {
            let total = session.total();
            session.window.apply(motion, total);
            list_changed(session, ctx);
        }
        Request::Select { index } => {
            let total = session.total();
            session.window.select(index, total);
            list_changed(session, ctx);
        }
        Request::Resize { window_size } => {
            let total = session.total();
            session.window.resize(window_size, total);
            list_changed(session, ctx);
        }
        Request::ToggleGroup { key } => {
            if session.toggle_group(&key) {
                list_changed(session, ctx);
            }
        }
        Request::ToggleSelected => {
            if let Some(key) = session.selected_group_key()
                && session.toggle_group(&key)
            {
                list_changed(session, ctx);
            }
        }
        Request::ExpandAll { expanded } => {
            session.set_all_expanded(expanded);
            list_changed(session, ctx);
        }

        // --- Detail ---
        Request::OpenSelected => match session.selected_entry() {
            Some(ListEntry::Group { key, .. }) => {
                if session.toggle_group(&key) {
                    list_changed(session, ctx);
                }
            }
            Some(ListEntry::Notification(n)) => open_detail(&n, session, ctx),
            None => {}
        },
        Request::Open { id } => {
            if let Some(n) = session.cache.get(&id).cloned() {
                open_detail(&n, session, ctx);
            } else {
                tracing::debug!("engine: open of unknown notification {id}");
            }
        }
        Request::RevealMore => reveal_more(session),
        Request::DetailScrolled { offset, viewport } => {
            let due = session
                .timeline_mut()
                .is_some_and(|(_, t)| t.should_prefetch(offset, viewport));
            if due {
                reveal_more(session);
            }
        }
        Request::CloseDetail => {
            if session.detail.take().is_some() {
                session.publish(&Event::DetailClosed);
            }
        }

        // --- Mutations ---
        Request::MarkDone { id } => {
            let kind = ctx.config.github.done_action.mutation_kind();
            let intents: Vec<_> =
                mutation::begin(kind, &id, &mut session.cache, &mut session.groups)
                    .into_iter()
                    .collect();
            start_mutations(intents, session, ctx);
        }
        Request::MarkGroupDone { key } => {
            let kind = ctx.config.github.done_action.mutation_kind();
            let intents =
                mutation::begin_group(kind, &key, &mut session.cache, &mut session.groups);
            start_mutations(intents, session, ctx);
        }
        Request::Unsubscribe { id } => {
            let intents: Vec<_> = mutation::begin(
                MutationKind::Unsubscribe,
                &id,
                &mut session.cache,
                &mut session.groups,
            )
            .into_iter()
            .collect();
            start_mutations(intents, session, ctx);
        }

        // --- Control ---
        Request::DismissError => {
            if session.error.take().is_some() {
                session.publish(&Event::ErrorDismissed);
            }
        }
        Request::Shutdown => unreachable!("handled at run_loop level"),
    }
    Flow::Continue
}

fn list_changed<T: Transport>(session: &mut Session, ctx: &mut Ctx<T>) {
    session.publish_list();
    enrich_visible(session, ctx);
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

fn start_refresh<T: Transport>(force_full: bool, session: &mut Session, ctx: &mut Ctx<T>) {
    if session.refreshing {
        tracing::debug!("engine: refresh already running, ignoring");
        return;
    }
    session.refreshing = true;

    let since = session.cache.plan_refresh(force_full);
    if force_full {
        session.enrichment.drain();
        session.rebuild();
        session.publish_list();
    }
    session.publish(&Event::Refreshing { force_full });
    tracing::debug!("engine: refreshing notifications since {since} (force_full={force_full})");

    let api = ctx.api.clone();
    let tx = ctx.done_tx.clone();
    let started_at = Utc::now();
    tokio::spawn(async move {
        let result = notif::fetch_notifications(&api, since).await;
        let _ = tx.send(Completion::Refreshed {
            force_full,
            started_at,
            result,
        });
    });
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Enqueue every visible pull-request record that has no entry yet.
fn enrich_visible<T: Transport>(session: &mut Session, ctx: &mut Ctx<T>) {
    let Some(viewer) = session.viewer.clone() else {
        request_viewer(session, ctx);
        return;
    };
    for (id, url) in session.visible_pull_requests() {
        let api = ctx.api.clone();
        let viewer = viewer.clone();
        session.enrichment.enqueue_if_absent(&id, move || {
            Box::pin(async move { pulls::fetch_pr_status(&api, &url, &viewer).await })
        });
    }
}

fn request_viewer<T: Transport>(session: &mut Session, ctx: &mut Ctx<T>) {
    if session.viewer_requested {
        return;
    }
    session.viewer_requested = true;
    let api = ctx.api.clone();
    let tx = ctx.done_tx.clone();
    let timeout = ctx.request_timeout;
    tokio::spawn(async move {
        let result = with_timeout(timeout, notif::fetch_current_user(&api)).await;
        let _ = tx.send(Completion::Viewer(result));
    });
}

fn handle_enrichment(outcome: EnrichmentOutcome<PrStatus>, session: &mut Session) {
    let id = outcome.id.clone();
    if session.enrichment.complete(outcome) {
        let status = session.enrichment.resolved(&id).copied();
        tracing::debug!("engine: enrichment for {id}: {status:?}");
        session.publish(&Event::EnrichmentChanged { id, status });
    }
}

// ---------------------------------------------------------------------------
// Detail
// ---------------------------------------------------------------------------

fn open_detail<T: Transport>(notification: &Notification, session: &mut Session, ctx: &mut Ctx<T>) {
    let ticket = session.open_detail(&notification.id);
    session.publish(&Event::DetailLoading {
        id: notification.id.clone(),
    });

    let api = ctx.api.clone();
    let tx = ctx.done_tx.clone();
    let timeout = ctx.request_timeout;
    let chunk_size = ctx.config.timeline.chunk_size;
    let notification = notification.clone();
    tokio::spawn(async move {
        let result = with_timeout(timeout, timeline::assemble(&api, &notification, chunk_size)).await;
        let _ = tx.send(Completion::Assembled { ticket, result });
    });
}

fn reveal_more(session: &mut Session) {
    let Some((id, timeline)) = session.timeline_mut() else {
        return;
    };
    let id = id.to_owned();
    match timeline.reveal_more() {
        Reveal::Appended(items) => {
            let event = Event::DetailAppended {
                id,
                items,
                has_more: timeline.has_more(),
                estimated_total_lines: timeline.estimated_total_lines(),
            };
            session.publish(&event);
        }
        Reveal::Exhausted => {}
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// The intents have already been applied locally; persist, publish, and
/// confirm them remotely in order.
fn start_mutations<T: Transport>(intents: Vec<MutationIntent>, session: &mut Session, ctx: &mut Ctx<T>) {
    if intents.is_empty() {
        return;
    }
    for intent in &intents {
        session.pending.insert(intent.notification.id.clone());
    }
    if session
        .detail
        .as_ref()
        .is_some_and(|d| session.pending.contains(&d.id))
    {
        session.detail = None;
        session.publish(&Event::DetailClosed);
    }
    let total = session.total();
    session.window.clamp(total);
    persist(session, ctx);
    list_changed(session, ctx);

    let api = ctx.api.clone();
    let tx = ctx.done_tx.clone();
    let timeout = ctx.request_timeout;
    tokio::spawn(async move {
        let mut results = Vec::with_capacity(intents.len());
        for intent in intents {
            let result = with_timeout(timeout, mutation::confirm(&api, &intent)).await;
            results.push((intent, result));
        }
        let _ = tx.send(Completion::Confirmed(results));
    });
}

// ---------------------------------------------------------------------------
// Completions
// ---------------------------------------------------------------------------

fn handle_completion<T: Transport>(done: Completion, session: &mut Session, ctx: &mut Ctx<T>) -> Flow {
    match done {
        Completion::Refreshed {
            force_full,
            started_at,
            result,
        } => {
            session.refreshing = false;
            match result {
                Ok(fetched) => {
                    tracing::debug!(
                        "engine: refresh fetched {} notifications (force_full={force_full})",
                        fetched.len()
                    );
                    session.apply_fetched(fetched, started_at);
                    ctx.scheduler.mark_fetched();
                    persist(session, ctx);
                    list_changed(session, ctx);
                }
                Err(e) if e.is_auth() => return end_session(&e, session, ctx),
                Err(e) => {
                    tracing::debug!("engine: refresh error: {e}");
                    session.report_error(Event::FetchFailed {
                        context: "refresh".to_owned(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Completion::Viewer(result) => match result {
            Ok(login) => {
                tracing::debug!("engine: current user is {login}");
                session.viewer = Some(login);
                enrich_visible(session, ctx);
            }
            Err(e) if e.is_auth() => return end_session(&e, session, ctx),
            Err(e) => {
                tracing::debug!("engine: current user lookup failed: {e}");
                session.viewer_requested = false;
            }
        },

        Completion::Assembled { ticket, result } => {
            let Some(detail) = session.detail_for_ticket(ticket) else {
                tracing::debug!("engine: dropping timeline for closed detail view");
                return Flow::Continue;
            };
            match result {
                Ok(timeline) => {
                    detail.timeline = Some(timeline);
                    if let Some(view) = detail.view() {
                        session.publish(&Event::DetailLoaded(view));
                    }
                }
                Err(e) => {
                    session.detail = None;
                    if e.is_auth() {
                        return end_session(&e, session, ctx);
                    }
                    tracing::debug!("engine: timeline error: {e}");
                    session.report_error(Event::FetchFailed {
                        context: "timeline".to_owned(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Completion::Confirmed(results) => {
            let mut auth_error = None;
            let mut rolled_back = false;
            // Reverse order so rollbacks of one group land where they were.
            for (intent, result) in results.into_iter().rev() {
                session.pending.remove(&intent.notification.id);
                let Err(e) = result else {
                    continue;
                };
                tracing::debug!(
                    "engine: {} of {} failed: {e}",
                    intent.kind.describe(),
                    intent.notification.id
                );
                let description = format!(
                    "{} \"{}\"",
                    intent.kind.describe(),
                    intent.notification.subject.title
                );
                mutation::rollback(intent, &mut session.cache, &mut session.groups);
                rolled_back = true;
                if e.is_auth() {
                    auth_error = Some(e);
                } else {
                    session.report_error(Event::MutationFailed {
                        description,
                        message: e.to_string(),
                    });
                }
            }
            if rolled_back {
                let total = session.total();
                session.window.clamp(total);
                persist(session, ctx);
                list_changed(session, ctx);
            }
            if let Some(e) = auth_error {
                return end_session(&e, session, ctx);
            }
        }
    }
    Flow::Continue
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn with_timeout<V>(
    timeout: Duration,
    fut: impl Future<Output = Result<V, FetchError>>,
) -> Result<V, FetchError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::TimedOut(timeout)),
    }
}

fn persist<T>(session: &Session, ctx: &mut Ctx<T>) {
    if let Err(e) = session.cache.save(ctx.store.as_mut()) {
        tracing::warn!("engine: saving notification cache failed: {e:#}");
    }
}

/// The credential was rejected: forget it and end the session.
fn end_session<T>(error: &FetchError, session: &mut Session, ctx: &mut Ctx<T>) -> Flow {
    tracing::debug!("engine: credential rejected: {error}");
    if let Err(e) = ctx.store.remove(KEY_GITHUB_TOKEN) {
        tracing::warn!("engine: clearing stored token failed: {e:#}");
    }
    session.publish(&Event::AuthInvalid {
        message: error.to_string(),
    });
    Flow::Stop
}
