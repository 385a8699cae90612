//! Upstream feed retrieval.
//!
//! Feeds are fetched as text through an [`HttpClient`], optionally wrapped
//! in one of the [`auth`] decorators, with a small fixed-delay retry loop
//! for transient failures.

mod basic;
pub mod auth;

pub use basic::BasicClient;

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, Request, Response, StatusCode, Url};
use tracing::{debug, warn};

/// Sends a prepared request; the [`auth`] decorators wrap another client and
/// attach credentials before delegating.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Longest body excerpt kept in a status error.
const ERROR_BODY_LIMIT: usize = 200;

/// A response that arrived but did not carry a 2xx status.
#[derive(Debug)]
pub struct HttpStatusError {
    pub status: StatusCode,
    pub body: String,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream returned status {}", self.status)?;
        if !self.body.is_empty() {
            write!(f, ": {}", self.body)?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpStatusError {}

impl HttpStatusError {
    fn new(status: StatusCode, body: &str) -> Self {
        let body: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
        Self { status, body }
    }

    /// Server-side and throttling failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        self.status.is_server_error() || self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// How many times to try a request and how long to wait between tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

async fn fetch_url<C: HttpClient + ?Sized>(client: &C, url: &Url) -> Result<String> {
    let req = Request::new(Method::GET, url.clone());
    let resp = client.execute(req).await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(HttpStatusError::new(status, &body).into());
    }
    Ok(body)
}

/// GETs `url` and returns the body of a successful response.
pub async fn fetch_text<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<String> {
    let url: Url = url
        .parse()
        .with_context(|| format!("invalid feed URL '{url}'"))?;
    fetch_url(client, &url).await
}

/// Like [`fetch_text`], retrying transport errors and transient statuses.
pub async fn fetch_text_with_retry<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    policy: RetryPolicy,
) -> Result<String> {
    let parsed: Url = url
        .parse()
        .with_context(|| format!("invalid feed URL '{url}'"))?;
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match fetch_url(client, &parsed).await {
            Ok(body) => {
                debug!(url, attempt, bytes = body.len(), "Feed fetched");
                return Ok(body);
            }
            Err(e) => {
                let transient = e
                    .downcast_ref::<HttpStatusError>()
                    .is_none_or(HttpStatusError::is_transient);
                if !transient || attempt >= attempts {
                    return Err(e.context(format!("fetching {url} failed after {attempt} attempt(s)")));
                }
                warn!(url, attempt, error = %e, "Feed fetch failed, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
