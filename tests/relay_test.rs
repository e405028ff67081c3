use chrono::{DateTime, Utc};
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gh_notifier::config::types::RelayConfig;
use gh_notifier::github::stub::notification_json;
use gh_notifier::github::{GitHubApi, OctocrabTransport, StubTransport};
use gh_notifier::relay::{Notifier, Relay};

fn relay_config() -> RelayConfig {
    RelayConfig {
        exclude_orgs: vec!["botorg".to_owned()],
        exclude_repos: vec!["acme/noise".to_owned()],
        ..RelayConfig::default()
    }
}

fn seeded_stub() -> StubTransport {
    let stub = StubTransport::new();
    let list = [
        notification_json("1", "acme/app", "2024-01-01T10:00:00Z", "PullRequest"),
        notification_json("2", "botorg/bot", "2024-01-01T09:00:00Z", "Issue"),
        notification_json("3", "acme/noise", "2024-01-01T08:00:00Z", "Issue"),
    ];
    stub.on_get("https://api.test/notifications?", format!("[{}]", list.join(",")));
    stub
}

async fn sink_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn excluded_orgs_and_repos_are_not_forwarded() {
    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&sink)
        .await;

    let stub = seeded_stub();
    let api = GitHubApi::new(stub.clone(), "https://api.test", 100, 5);
    let notifier = Notifier::new(&format!("{}/", sink.uri()), "s3cret");
    let mut relay = Relay::new(api, notifier, &relay_config(), DateTime::UNIX_EPOCH);

    let report = relay.poll_once().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.forwarded, 1);
    assert_eq!(report.excluded, 2);

    let bodies = sink_bodies(&sink).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["title"], "[acme/app] Subject 1");
    assert_eq!(bodies[0]["source"], "github");
    assert_eq!(bodies[0]["actions"][0]["label"], "Open PR");
    assert_eq!(bodies[0]["actions"][0]["url"], "https://api.test/repos/acme/app/pull/1");
}

#[tokio::test]
async fn forwarded_ids_are_not_sent_twice() {
    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&sink)
        .await;

    let stub = seeded_stub();
    let api = GitHubApi::new(stub.clone(), "https://api.test", 100, 5);
    let mut relay = Relay::new(api, Notifier::new(&sink.uri(), "s"), &relay_config(), DateTime::UNIX_EPOCH);

    let before = Utc::now();
    relay.poll_once().await.unwrap();
    assert!(relay.since() >= before);

    let second = relay.poll_once().await.unwrap();
    assert_eq!(second.forwarded, 0);
    assert_eq!(relay.forwarded_count(), 1);

    // The second fetch starts at the first fetch's start time.
    let calls = stub.calls();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].url.contains("since="));
    assert!(calls[1].url.contains("since="));
}

#[tokio::test]
async fn failed_delivery_is_retried_next_cycle() {
    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .up_to_n_times(1)
        .mount(&sink)
        .await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&sink)
        .await;

    let stub = seeded_stub();
    let api = GitHubApi::new(stub, "https://api.test", 100, 5);
    let mut relay = Relay::new(api, Notifier::new(&sink.uri(), "s"), &relay_config(), DateTime::UNIX_EPOCH);

    let first = relay.poll_once().await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(relay.forwarded_count(), 0);

    let second = relay.poll_once().await.unwrap();
    assert_eq!(second.forwarded, 1);
    assert_eq!(relay.forwarded_count(), 1);
}

#[tokio::test]
async fn polls_github_through_octocrab() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let github = MockServer::start().await;
    let list = format!(
        "[{}]",
        notification_json("7", "acme/app", "2024-01-01T10:00:00Z", "Issue")
    );
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(list, "application/json"))
        .mount(&github)
        .await;

    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&sink)
        .await;

    let transport = OctocrabTransport::with_base_uri(&github.uri(), "t").unwrap();
    let api = GitHubApi::new(transport, github.uri(), 100, 5);
    let mut relay = Relay::new(api, Notifier::new(&sink.uri(), "s"), &RelayConfig::default(), Utc::now());

    let report = relay.poll_once().await.unwrap();
    assert_eq!(report.forwarded, 1);
    let bodies = sink_bodies(&sink).await;
    assert_eq!(bodies[0]["message"], "watching on issue in acme/app");
    assert_eq!(bodies[0]["status"], "info");
}
