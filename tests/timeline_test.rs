use chrono::{TimeZone, Utc};
use http::Method;

use gh_notifier::github::{GitHubApi, StubTransport};
use gh_notifier::timeline::{self, Reveal};
use gh_notifier::types::{CodeContext, Notification, Reason, RepoRef, Subject, SubjectType, TimelineItem};
use gh_notifier::url::web_url;

fn notification(kind: &str, url: &str) -> Notification {
    Notification {
        id: "42".to_owned(),
        repository: RepoRef::from_full_name("o/r").unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        reason: Reason::parse("mention"),
        subject: Subject {
            title: "Subject".to_owned(),
            kind: SubjectType::parse(kind),
            url: Some(url.to_owned()),
            latest_comment_url: None,
        },
        unread: true,
        subscription_url: String::new(),
    }
}

fn api(stub: &StubTransport) -> GitHubApi<StubTransport> {
    GitHubApi::new(stub.clone(), "https://api.test", 50, 5)
}

fn comments_json(count: usize) -> String {
    let items: Vec<_> = (0..count)
        .map(|i| {
            serde_json::json!({
                "body": format!("comment {i}"),
                "user": { "login": "dev" },
                "created_at": format!("2024-01-01T{:02}:{:02}:00Z", i / 60, i % 60),
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

#[tokio::test]
async fn pull_request_merges_conversation_and_review_comments() {
    let stub = StubTransport::new();
    stub.on_get(
        "https://api.test/repos/o/r/pulls/7",
        r#"{"title":"Add cache","state":"closed","merged":true,"body":"","number":7,
            "comments_url":"https://api.test/repos/o/r/issues/7/comments",
            "review_comments_url":"https://api.test/repos/o/r/pulls/7/comments"}"#,
    );
    stub.on_get(
        "https://api.test/repos/o/r/issues/7/comments",
        r#"[{"body":"looks good","user":{"login":"alice"},"created_at":"2024-01-01T10:00:00Z"}]"#,
    );
    stub.on_get(
        "https://api.test/repos/o/r/pulls/7/comments",
        r#"[{"path":"src/lib.rs","line":12,"body":"nit","user":{"login":"bob"},"created_at":"2024-01-01T11:00:00Z"}]"#,
    );

    let n = notification("PullRequest", "https://api.test/repos/o/r/pulls/7");
    let timeline = timeline::assemble(&api(&stub), &n, 30).await.unwrap();

    assert!(timeline.subject().merged);
    assert!(!timeline.has_more());
    assert_eq!(timeline.revealed().len(), 2);
    let TimelineItem::Comment { author, context, .. } = &timeline.revealed()[0] else {
        panic!("expected a review comment first");
    };
    assert_eq!(author, "bob");
    assert_eq!(
        context,
        &Some(CodeContext {
            path: "src/lib.rs".to_owned(),
            line: Some(12),
        })
    );

    // Pull requests read their events from the issue feed; a 404 there is empty.
    assert_eq!(
        stub.count(&Method::GET, "https://api.test/repos/o/r/issues/7/events"),
        1
    );
}

#[tokio::test]
async fn long_discussion_is_revealed_in_chunks() {
    let stub = StubTransport::new();
    stub.on_get(
        "https://api.test/repos/o/r/issues/9",
        r#"{"title":"Roadmap","state":"open","body":"","number":9,
            "comments_url":"https://api.test/repos/o/r/issues/9/comments"}"#,
    );
    stub.on_get("https://api.test/repos/o/r/issues/9/comments", comments_json(65));
    stub.on_get("https://api.test/repos/o/r/issues/9/events", "[]");

    let n = notification("Issue", "https://api.test/repos/o/r/issues/9");
    let mut timeline = timeline::assemble(&api(&stub), &n, 30).await.unwrap();

    assert_eq!(timeline.total_items(), 65);
    assert_eq!(timeline.revealed().len(), 30);
    assert!(timeline.has_more());
    // 35 hidden one-line comments at the revealed average of one body line.
    assert_eq!(timeline.average_comment_lines(), 1);
    assert_eq!(timeline.estimated_total_lines(), timeline.rendered_lines() + 35);

    let Reveal::Appended(second) = timeline.reveal_more() else {
        panic!("expected a second chunk");
    };
    assert_eq!(second.len(), 30);
    let Reveal::Appended(third) = timeline.reveal_more() else {
        panic!("expected a final chunk");
    };
    assert_eq!(third.len(), 5);
    assert!(!timeline.has_more());
    assert_eq!(timeline.reveal_more(), Reveal::Exhausted);

    // Newest first across all chunks.
    let revealed = timeline.revealed();
    assert_eq!(revealed.len(), 65);
    assert!(revealed.windows(2).all(|w| w[0].created_at() >= w[1].created_at()));
}

#[tokio::test]
async fn assembled_timeline_is_served_from_cache() {
    let stub = StubTransport::new();
    stub.on_get(
        "https://api.test/repos/o/r/issues/3",
        r#"{"title":"Bug","state":"open","body":"b","number":3,
            "comments_url":"https://api.test/repos/o/r/issues/3/comments"}"#,
    );
    stub.on_get("https://api.test/repos/o/r/issues/3/comments", comments_json(2));
    stub.on_get("https://api.test/repos/o/r/issues/3/events", "[]");

    let api = api(&stub);
    let n = notification("Issue", "https://api.test/repos/o/r/issues/3");
    let first = timeline::assemble(&api, &n, 30).await.unwrap();
    let calls = stub.calls().len();

    let second = timeline::assemble(&api, &n, 30).await.unwrap();
    assert_eq!(stub.calls().len(), calls);
    assert_eq!(first, second);
}

#[test]
fn review_listing_maps_to_pull_page() {
    assert_eq!(
        web_url("https://api.github.com/repos/o/r/pulls/7/reviews"),
        "https://github.com/o/r/pull/7"
    );
}
