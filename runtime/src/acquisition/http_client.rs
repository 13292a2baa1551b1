// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Async HTTP client wrapping reqwest.
//!
//! Not a browser, only HTTP requests with browser-like headers. Handles
//! redirects, per-request timeouts, and retry on 5xx/429/transport errors.

use crate::retry::RetryPolicy;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::Instant;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/130.0.0.0 Safari/537.36";

/// Errors from a single GET.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("forbidden while fetching {url}")]
    Forbidden { url: String },
    #[error("unexpected status {status} for {url}")]
    Status { status: StatusCode, url: String },
    #[error("gave up on {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

impl FetchError {
    /// Worth another attempt: server errors, throttling, connection trouble.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Forbidden { .. } | Self::Timeout { .. } => false,
        }
    }

    fn looks_like_protocol_error(&self) -> bool {
        let err_str = self.to_string();
        err_str.contains("http2") || err_str.contains("protocol") || err_str.contains("connection closed")
    }
}

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// HTTP client shared by the wallet extractor and the dividend fetcher.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Create a client with the default retry policy (3 attempts, 500ms backoff).
    pub fn new(base_url: &str) -> Self {
        Self::with_retry(base_url, RetryPolicy::default())
    }

    pub fn with_retry(base_url: &str, retry: RetryPolicy) -> Self {
        let headers = default_headers(base_url);

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .default_headers(headers.clone())
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            retry,
        }
    }

    /// GET `url`, retrying transient failures.
    ///
    /// `timeout` bounds the whole call, retries and backoff included. Falls
    /// back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let deadline = Instant::now() + timeout;
        let attempts = async {
            match self.get_with_retry(&self.client, url, deadline).await {
                Ok(resp) => Ok(resp),
                Err(e) if e.looks_like_protocol_error() => {
                    tracing::debug!(url, "retrying over HTTP/1.1 after: {e}");
                    self.get_with_retry(&self.h1_client, url, deadline).await
                }
                Err(e) => Err(e),
            }
        };
        tokio::time::timeout_at(deadline, attempts)
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                })
            })
    }

    async fn get_with_retry(
        &self,
        client: &reqwest::Client,
        url: &str,
        deadline: Instant,
    ) -> Result<HttpResponse, FetchError> {
        self.retry
            .run(
                || Self::get_once(client, url, deadline.saturating_duration_since(Instant::now())),
                FetchError::is_transient,
            )
            .await
    }

    async fn get_once(
        client: &reqwest::Client,
        url: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        let resp = client.get(url).timeout(timeout).send().await?;
        let status = resp.status();
        if status == StatusCode::FORBIDDEN {
            return Err(FetchError::Forbidden {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }
        let final_url = resp.url().to_string();
        let body = resp.text().await?;
        Ok(HttpResponse {
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

fn default_headers(base_url: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    let referer = format!("{}/", base_url.trim_end_matches('/'));
    if let Ok(value) = HeaderValue::from_str(&referer) {
        headers.insert(REFERER, value);
    }
    headers
}
