use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use http::{Method, StatusCode};

use gh_notifier::config::types::AppConfig;
use gh_notifier::engine::{Engine, EngineHandle, Event, GitHubEngine, ListView, Request};
use gh_notifier::github::stub::notification_json;
use gh_notifier::github::{GitHubApi, RawResponse, StubTransport};
use gh_notifier::grouping::ListEntry;
use gh_notifier::store::{self, FileStore, MemoryStore, Store};
use gh_notifier::types::{PrState, PrStatus, TimelineItem};
use gh_notifier::window::Motion;

const NOTIFICATIONS: &str = "https://api.test/notifications?";

fn seed(stub: &StubTransport) {
    let list = [
        notification_json("1", "acme/app", "2024-01-01T10:00:00Z", "PullRequest"),
        notification_json("2", "acme/lib", "2024-01-01T09:00:00Z", "Issue"),
        notification_json("3", "acme/app", "2024-01-01T08:00:00Z", "Issue"),
    ];
    stub.on_get(NOTIFICATIONS, format!("[{}]", list.join(",")));
}

fn start(stub: &StubTransport, store: Box<dyn Store>) -> (EngineHandle, Receiver<Event>) {
    let api = GitHubApi::new(stub.clone(), "https://api.test", 50, 5);
    let handle = GitHubEngine::new(api, store, AppConfig::default()).start();
    let (tx, rx) = std::sync::mpsc::channel::<Event>();
    handle.send(Request::Subscribe { notify_tx: tx });
    (handle, rx)
}

fn wait_for(rx: &Receiver<Event>, mut pred: impl FnMut(&Event) -> bool) -> Event {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = rx
            .recv_timeout(remaining)
            .expect("engine should publish the expected event within 5 seconds");
        if pred(&event) {
            return event;
        }
    }
}

fn wait_for_list(rx: &Receiver<Event>, total: usize) -> ListView {
    match wait_for(rx, |e| matches!(e, Event::ListChanged(v) if v.total == total)) {
        Event::ListChanged(view) => view,
        _ => unreachable!(),
    }
}

fn row_ids(view: &ListView) -> Vec<String> {
    view.rows
        .iter()
        .map(|r| match &r.entry {
            ListEntry::Group { key, .. } => format!("[{key}]"),
            ListEntry::Notification(n) => n.id.clone(),
        })
        .collect()
}

#[test]
fn initial_refresh_groups_by_repository() {
    let stub = StubTransport::new();
    seed(&stub);
    let (handle, rx) = start(&stub, Box::new(MemoryStore::with_token("t")));

    let collapsed = wait_for_list(&rx, 2);
    assert_eq!(row_ids(&collapsed), vec!["[acme/app]", "[acme/lib]"]);

    handle.send(Request::ExpandAll { expanded: true });
    let expanded = wait_for_list(&rx, 5);
    assert_eq!(row_ids(&expanded), vec!["[acme/app]", "1", "3", "[acme/lib]", "2"]);
    handle.send(Request::Shutdown);
}

#[test]
fn visible_pull_requests_are_enriched_once() {
    let stub = StubTransport::new();
    seed(&stub);
    stub.on_get("https://api.test/user", r#"{"login":"me"}"#);
    stub.on_get(
        "https://api.test/repos/acme/app/pulls/1",
        r#"{"state":"open","merged":false}"#,
    );
    stub.on_get(
        "https://api.test/repos/acme/app/pulls/1/reviews",
        r#"[{"state":"APPROVED","user":{"login":"me"}}]"#,
    );
    let (handle, rx) = start(&stub, Box::new(MemoryStore::with_token("t")));
    wait_for_list(&rx, 2);
    handle.send(Request::ExpandAll { expanded: true });
    wait_for_list(&rx, 5);

    let event = wait_for(&rx, |e| matches!(e, Event::EnrichmentChanged { .. }));
    assert_eq!(
        event,
        Event::EnrichmentChanged {
            id: "1".to_owned(),
            status: Some(PrStatus {
                state: PrState::Open,
                approved: true,
            }),
        }
    );

    handle.send(Request::Navigate(Motion::Down));
    let view = wait_for_list(&rx, 5);
    assert_eq!(view.selected, 1);
    assert_eq!(
        view.rows[1].status,
        Some(PrStatus {
            state: PrState::Open,
            approved: true
        })
    );
    assert_eq!(
        stub.count(&Method::GET, "https://api.test/repos/acme/app/pulls/1/reviews"),
        1
    );
    handle.send(Request::Shutdown);
}

#[test]
fn rejected_mark_done_rolls_back() {
    let stub = StubTransport::new();
    seed(&stub);
    stub.on(
        Method::PATCH,
        "https://api.test/notifications/threads/2",
        RawResponse::status(StatusCode::UNPROCESSABLE_ENTITY, r#"{"message":"nope"}"#),
    );
    let (handle, rx) = start(&stub, Box::new(MemoryStore::with_token("t")));
    wait_for_list(&rx, 2);
    handle.send(Request::ExpandAll { expanded: true });
    let before = wait_for_list(&rx, 5);

    handle.send(Request::MarkDone { id: "2".to_owned() });
    let optimistic = wait_for_list(&rx, 3);
    assert_eq!(row_ids(&optimistic), vec!["[acme/app]", "1", "3"]);

    let failed = wait_for(&rx, |e| matches!(e, Event::MutationFailed { .. }));
    let Event::MutationFailed { description, .. } = failed else {
        unreachable!()
    };
    assert_eq!(description, "mark as read \"Subject 2\"");

    let restored = wait_for_list(&rx, 5);
    assert_eq!(restored.rows, before.rows);

    handle.send(Request::DismissError);
    wait_for(&rx, |e| matches!(e, Event::ErrorDismissed));
    handle.send(Request::Shutdown);
}

#[test]
fn group_done_confirms_every_member() {
    let stub = StubTransport::new();
    seed(&stub);
    stub.on(
        Method::PATCH,
        "https://api.test/notifications/threads/",
        RawResponse::status(StatusCode::RESET_CONTENT, ""),
    );
    let (handle, rx) = start(&stub, Box::new(MemoryStore::with_token("t")));
    wait_for_list(&rx, 2);

    handle.send(Request::MarkGroupDone {
        key: "acme/app".to_owned(),
    });
    let view = wait_for_list(&rx, 1);
    assert_eq!(row_ids(&view), vec!["[acme/lib]"]);

    let deadline = Instant::now() + Duration::from_secs(5);
    while stub.count(&Method::PATCH, "https://api.test/notifications/threads/") < 2 {
        assert!(Instant::now() < deadline, "both threads should be marked read");
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(stub.count(&Method::PATCH, "https://api.test/notifications/threads/1"), 1);
    assert_eq!(stub.count(&Method::PATCH, "https://api.test/notifications/threads/3"), 1);
    handle.send(Request::Shutdown);
}

#[test]
fn opening_a_record_loads_its_timeline() {
    let stub = StubTransport::new();
    seed(&stub);
    stub.on_get(
        "https://api.test/repos/acme/lib/issues/2",
        r#"{"title":"Flaky test","state":"open","body":"line1\nline2","number":2,
            "comments_url":"https://api.test/repos/acme/lib/issues/2/comments"}"#,
    );
    stub.on_get(
        "https://api.test/repos/acme/lib/issues/2/comments",
        r#"[{"body":"first","user":{"login":"a"},"created_at":"2024-01-01T01:00:00Z"},
            {"body":"second","user":null,"created_at":"2024-01-01T03:00:00Z"}]"#,
    );
    stub.on_get(
        "https://api.test/repos/acme/lib/issues/2/events",
        r#"[{"event":"labeled","actor":{"login":"b"},"created_at":"2024-01-01T02:00:00Z","label":{"name":"bug"}},
            {"event":"subscribed","actor":{"login":"b"},"created_at":"2024-01-01T02:30:00Z"}]"#,
    );
    let (handle, rx) = start(&stub, Box::new(MemoryStore::with_token("t")));
    wait_for_list(&rx, 2);

    handle.send(Request::Open { id: "2".to_owned() });
    wait_for(&rx, |e| matches!(e, Event::DetailLoading { id } if id == "2"));
    let Event::DetailLoaded(view) = wait_for(&rx, |e| matches!(e, Event::DetailLoaded(_))) else {
        unreachable!()
    };
    assert_eq!(view.subject.title, "Flaky test");
    assert!(!view.has_more);
    let authors: Vec<&str> = view
        .items
        .iter()
        .map(|item| match item {
            TimelineItem::Comment { author, .. } => author.as_str(),
            TimelineItem::Event { actor, .. } => actor.as_str(),
        })
        .collect();
    assert_eq!(authors, vec!["ghost", "b", "a"]);

    handle.send(Request::CloseDetail);
    wait_for(&rx, |e| matches!(e, Event::DetailClosed));
    handle.send(Request::Shutdown);
}

#[test]
fn rejected_token_is_cleared_and_session_ends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut file_store = FileStore::open(&path).unwrap();
    file_store
        .save(store::KEY_GITHUB_TOKEN, serde_json::json!("stale"))
        .unwrap();

    let stub = StubTransport::new();
    stub.on(
        Method::GET,
        NOTIFICATIONS,
        RawResponse::status(StatusCode::UNAUTHORIZED, r#"{"message":"Bad credentials"}"#),
    );
    let (_handle, rx) = start(&stub, Box::new(file_store));

    wait_for(&rx, |e| matches!(e, Event::AuthInvalid { .. }));
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap_err(),
        RecvTimeoutError::Disconnected
    );

    let reopened = FileStore::open(&path).unwrap();
    assert!(store::stored_token(&reopened).is_none());
}
