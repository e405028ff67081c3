use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use http::{Method, StatusCode};
use moka::future::Cache;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::FetchError;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Status, `Link` header and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub link: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            link: None,
            body: body.into(),
        }
    }

    pub fn status(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            link: None,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Decode a 2xx body, classifying anything else as a read failure.
    pub fn json<D: DeserializeOwned>(&self) -> Result<D, FetchError> {
        if !self.status.is_success() {
            return Err(FetchError::from_fetch_status(self.status, &self.body));
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The narrow fetch capability every remote call goes through.
///
/// Implementations return `Ok` for any HTTP answer, including non-2xx ones;
/// callers classify the status. `Err` is reserved for transport failures.
pub trait Transport: Send + Sync + 'static {
    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> impl Future<Output = Result<RawResponse, FetchError>> + Send;

    /// POST a GraphQL document and return the decoded response.
    fn graphql(&self, payload: &Value) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// API root for a host: `https://api.github.com` or `https://{host}/api/v3`.
pub fn api_base_for_host(host: &str) -> String {
    if host == "github.com" {
        "https://api.github.com".to_owned()
    } else {
        format!("https://{host}/api/v3")
    }
}

// ---------------------------------------------------------------------------
// Octocrab transport
// ---------------------------------------------------------------------------

pub struct OctocrabTransport {
    octocrab: Arc<Octocrab>,
}

impl OctocrabTransport {
    /// Build an authenticated client for `host` (`github.com` or an
    /// Enterprise host name).
    pub fn new(host: &str, token: &str) -> Result<Self> {
        let builder = if host == "github.com" {
            Octocrab::builder().personal_token(token.to_owned())
        } else {
            Octocrab::builder()
                .personal_token(token.to_owned())
                .base_uri(api_base_for_host(host))
                .context("setting GHE base URI")?
        };
        let octocrab = builder.build().context("building octocrab instance")?;
        Ok(Self {
            octocrab: Arc::new(octocrab),
        })
    }

    /// Build a client against an arbitrary API root (mock servers).
    pub fn with_base_uri(base_uri: &str, token: &str) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(token.to_owned())
            .base_uri(base_uri)
            .context("setting base URI")?
            .build()
            .context("building octocrab instance")?;
        Ok(Self {
            octocrab: Arc::new(octocrab),
        })
    }
}

fn transport_error(err: &octocrab::Error) -> FetchError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            FetchError::from_fetch_status(source.status_code, &source.message)
        }
        other => FetchError::Transient(other.to_string()),
    }
}

impl Transport for OctocrabTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<RawResponse, FetchError> {
        let uri = url.to_owned();
        let response = match method {
            Method::GET => self.octocrab._get(uri).await,
            Method::POST => self.octocrab._post(uri, body.as_ref()).await,
            Method::PATCH => self.octocrab._patch(uri, body.as_ref()).await,
            Method::PUT => self.octocrab._put(uri, body.as_ref()).await,
            Method::DELETE => self.octocrab._delete(uri, body.as_ref()).await,
            other => {
                return Err(FetchError::Transient(format!("unsupported method {other}")));
            }
        }
        .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let link = response
            .headers()
            .get(http::header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = self
            .octocrab
            .body_to_string(response)
            .await
            .map_err(|e| transport_error(&e))?;
        Ok(RawResponse { status, link, body })
    }

    async fn graphql(&self, payload: &Value) -> Result<Value, FetchError> {
        self.octocrab
            .graphql::<Value>(payload)
            .await
            .map_err(|e| transport_error(&e))
    }
}

// ---------------------------------------------------------------------------
// GitHubApi
// ---------------------------------------------------------------------------

/// Transport plus the per-session settings every endpoint helper needs, and
/// an LRU cache for assembled responses.
pub struct GitHubApi<T> {
    transport: Arc<T>,
    api_base: String,
    per_page: u8,
    cache: Cache<String, String>,
}

// Manual impl: `T` itself need not be `Clone`.
impl<T> Clone for GitHubApi<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            api_base: self.api_base.clone(),
            per_page: self.per_page,
            cache: self.cache.clone(),
        }
    }
}

impl<T: Transport> GitHubApi<T> {
    pub fn new(transport: T, api_base: impl Into<String>, per_page: u8, cache_ttl_minutes: u32) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(u64::from(cache_ttl_minutes) * 60))
            .build();
        Self {
            transport: Arc::new(transport),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            per_page: per_page.clamp(1, 100),
            cache,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn per_page(&self) -> u8 {
        self.per_page
    }

    /// Return a clone of the internal cache (Arc-backed, cheap to clone).
    pub fn cache(&self) -> Cache<String, String> {
        self.cache.clone()
    }

    pub async fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        self.transport.request(Method::GET, url, None).await
    }

    /// GET and decode a 2xx JSON body.
    pub async fn get_json<D: DeserializeOwned>(&self, url: &str) -> Result<D, FetchError> {
        self.get(url).await?.json()
    }
}
