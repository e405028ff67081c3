use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use http::{Method, StatusCode};
use serde_json::Value;

use crate::error::FetchError;
use crate::github::client::{RawResponse, Transport};

/// One request seen by [`StubTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

struct Route {
    method: Method,
    prefix: String,
    responses: VecDeque<Result<RawResponse, FetchError>>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    routes: Vec<Route>,
    calls: Vec<Call>,
    graphql: Option<Result<Value, FetchError>>,
}

/// A transport that serves canned responses without any network calls.
///
/// Routes match on method and URL prefix (longest prefix wins). When a route
/// has several queued responses they are served in order and the last one
/// repeats. Unmatched requests get a 404. Clones share state, so a test can
/// keep a handle while the engine owns another.
#[derive(Clone, Default)]
pub struct StubTransport {
    inner: Arc<Mutex<Inner>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, method: Method, prefix: &str, response: Result<RawResponse, FetchError>) {
        let mut inner = self.lock();
        if let Some(route) = inner
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.prefix == prefix)
        {
            route.responses.push_back(response);
        } else {
            inner.routes.push(Route {
                method,
                prefix: prefix.to_owned(),
                responses: VecDeque::from([response]),
                delay: None,
            });
        }
    }

    /// Queue a response for requests whose URL starts with `prefix`.
    pub fn on(&self, method: Method, prefix: &str, response: RawResponse) {
        self.push(method, prefix, Ok(response));
    }

    /// Shorthand for a 200 JSON answer to a GET.
    pub fn on_get(&self, prefix: &str, body: impl Into<String>) {
        self.on(Method::GET, prefix, RawResponse::ok(body));
    }

    /// Queue a transport-level failure.
    pub fn fail(&self, method: Method, prefix: &str, error: FetchError) {
        self.push(method, prefix, Err(error));
    }

    /// Hold every answer on the route for `delay` before returning it.
    pub fn delay(&self, method: &Method, prefix: &str, delay: Duration) {
        let mut inner = self.lock();
        if let Some(route) = inner
            .routes
            .iter_mut()
            .find(|r| r.method == *method && r.prefix == prefix)
        {
            route.delay = Some(delay);
        }
    }

    pub fn set_graphql(&self, response: Result<Value, FetchError>) {
        self.lock().graphql = Some(response);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls with `method` whose URL starts with `prefix`.
    pub fn count(&self, method: &Method, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == *method && c.url.starts_with(prefix))
            .count()
    }

    fn answer(&self, method: &Method, url: &str) -> (Result<RawResponse, FetchError>, Option<Duration>) {
        let mut inner = self.lock();
        let route = inner
            .routes
            .iter_mut()
            .filter(|r| r.method == *method && url.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());
        let Some(route) = route else {
            return (
                Ok(RawResponse::status(
                    StatusCode::NOT_FOUND,
                    r#"{"message":"Not Found"}"#,
                )),
                None,
            );
        };
        let response = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        };
        let response = response.unwrap_or_else(|| Ok(RawResponse::ok("null")));
        (response, route.delay)
    }
}

impl Transport for StubTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<RawResponse, FetchError> {
        let (response, delay) = self.answer(&method, url);
        self.lock().calls.push(Call {
            method,
            url: url.to_owned(),
            body,
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn graphql(&self, payload: &Value) -> Result<Value, FetchError> {
        let mut inner = self.lock();
        inner.calls.push(Call {
            method: Method::POST,
            url: "graphql".to_owned(),
            body: Some(payload.clone()),
        });
        inner
            .graphql
            .clone()
            .unwrap_or_else(|| Ok(serde_json::json!({ "data": null })))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A REST notification object as the list endpoint returns it.
///
/// `repo` is `owner/name`; the subject URL is derived from the subject type.
pub fn notification_json(id: &str, repo: &str, updated_at: &str, subject_type: &str) -> String {
    let (owner, name) = repo.split_once('/').unwrap_or((repo, repo));
    let segment = match subject_type {
        "PullRequest" => "pulls",
        "Discussion" => "discussions",
        "Release" => "releases",
        _ => "issues",
    };
    serde_json::json!({
        "id": id,
        "unread": true,
        "reason": "subscribed",
        "updated_at": updated_at,
        "subject": {
            "title": format!("Subject {id}"),
            "url": format!("https://api.test/repos/{repo}/{segment}/{id}"),
            "latest_comment_url": null,
            "type": subject_type,
        },
        "repository": {
            "name": name,
            "full_name": repo,
            "owner": { "login": owner },
        },
        "subscription_url": format!("https://api.test/notifications/threads/{id}/subscription"),
    })
    .to_string()
}
