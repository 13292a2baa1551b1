// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API.
//!
//! Thin axum layer over [`DataComService`]: query parameters in, JSON out,
//! plus an SSE stream of job progress.

use crate::errors::EnrichError;
use crate::jobs::EnrichmentJob;
use crate::progress::ProgressEvent;
use crate::service::{DataComService, Submission, DEFAULT_TIMEOUT_SECS};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Build the axum Router with all REST endpoints.
pub fn router(service: Arc<DataComService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/assets", get(handle_assets))
        .route("/api/v1/data-com", get(handle_data_com))
        .route("/api/v1/data-com/jobs/:id", get(handle_job))
        .route("/api/v1/wallet-entries", get(handle_wallet_entries))
        .route("/api/v1/events", get(events_sse))
        .layer(cors)
        .with_state(service)
}

/// Serve the API on `addr` until Ctrl-C.
pub async fn start(addr: SocketAddr, service: Arc<DataComService>) -> anyhow::Result<()> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

/// Query string shared by the wallet endpoints. Values are kept as text so
/// a malformed `timeout` or `async` falls back to its default instead of
/// rejecting the request.
#[derive(Deserialize, Default)]
struct WalletParams {
    wallet_url: Option<String>,
    wallet_entries_url: Option<String>,
    timeout: Option<String>,
    #[serde(rename = "async")]
    run_async: Option<String>,
}

impl WalletParams {
    fn wallet_url(&self) -> Result<&str, ApiError> {
        required("wallet_url", self.wallet_url.as_deref())
    }

    fn wallet_entries_url(&self) -> Result<&str, ApiError> {
        required("wallet_entries_url", self.wallet_entries_url.as_deref())
    }

    fn timeout_secs(&self) -> i64 {
        self.timeout
            .as_deref()
            .and_then(|t| t.trim().parse::<f64>().ok())
            .filter(|t| t.is_finite())
            .map(|t| t as i64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    fn run_async(&self) -> bool {
        self.run_async
            .as_deref()
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }
}

fn required<'a>(param: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError(EnrichError::InvalidRequest(format!("{param} parameter is required"))))
}

struct ApiError(EnrichError);

impl From<EnrichError> for ApiError {
    fn from(e: EnrichError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EnrichError::BudgetExceeded(_) => (StatusCode::GATEWAY_TIMEOUT, self.0.to_string()),
            EnrichError::UpstreamExtraction(_) => (StatusCode::BAD_GATEWAY, self.0.to_string()),
            EnrichError::JobNotFound(_) => (StatusCode::NOT_FOUND, "job not found".to_string()),
            EnrichError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            EnrichError::InvalidTransition { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────

async fn health(State(service): State<Arc<DataComService>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "jobs": service.job_count(),
    }))
}

async fn handle_assets(
    State(service): State<Arc<DataComService>>,
    Query(params): Query<WalletParams>,
) -> Result<Json<Value>, ApiError> {
    let tables = service
        .extract(params.wallet_url()?, params.timeout_secs())
        .await?;
    Ok(Json(json!({ "tables": tables })))
}

async fn handle_data_com(
    State(service): State<Arc<DataComService>>,
    Query(params): Query<WalletParams>,
) -> Result<Response, ApiError> {
    let submission = service
        .submit(params.wallet_url()?, params.timeout_secs(), params.run_async())
        .await?;
    Ok(match submission {
        Submission::Accepted { job_id } => {
            (StatusCode::ACCEPTED, Json(json!({ "job_id": job_id }))).into_response()
        }
        Submission::Completed(report) => Json(report).into_response(),
    })
}

async fn handle_wallet_entries(
    State(service): State<Arc<DataComService>>,
    Query(params): Query<WalletParams>,
) -> Result<Json<Value>, ApiError> {
    let tables = service
        .entries(params.wallet_entries_url()?, params.timeout_secs())
        .await?;
    Ok(Json(json!({ "tables": tables })))
}

async fn handle_job(
    State(service): State<Arc<DataComService>>,
    Path(id): Path<String>,
) -> Result<Json<EnrichmentJob>, ApiError> {
    Ok(Json(service.poll(&id)?))
}

#[derive(Deserialize, Default)]
struct EventsParams {
    job_id: Option<String>,
}

/// Server-Sent Events stream of job progress.
///
/// With `?job_id=` only that job's events are sent and the stream ends after
/// its terminal event.
async fn events_sse(
    Query(params): Query<EventsParams>,
    State(service): State<Arc<DataComService>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = service.subscribe();
    let job_filter = params.job_id;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !matches_job(&event, job_filter.as_deref()) {
                        continue;
                    }
                    let terminal = event.event.is_terminal();
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().data(json));
                    }
                    if terminal && job_filter.is_some() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn matches_job(event: &ProgressEvent, job_id: Option<&str>) -> bool {
    job_id.map_or(true, |id| event.job_id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(timeout: Option<&str>, run_async: Option<&str>) -> WalletParams {
        WalletParams {
            wallet_url: Some("https://investidor10.com.br/wallet/1".to_string()),
            wallet_entries_url: None,
            timeout: timeout.map(str::to_string),
            run_async: run_async.map(str::to_string),
        }
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(params(None, None).timeout_secs(), 55);
        assert_eq!(params(Some("20"), None).timeout_secs(), 20);
        assert_eq!(params(Some("12.9"), None).timeout_secs(), 12);
        assert_eq!(params(Some("abc"), None).timeout_secs(), 55);
    }

    #[test]
    fn test_async_flag_parsing() {
        assert!(params(None, Some("true")).run_async());
        assert!(params(None, Some("1")).run_async());
        assert!(!params(None, Some("0")).run_async());
        assert!(!params(None, Some("false")).run_async());
        assert!(!params(None, None).run_async());
    }

    #[test]
    fn test_missing_wallet_url() {
        let p = WalletParams::default();
        assert!(p.wallet_url().is_err());
        assert!(params(None, None).wallet_entries_url().is_err());
    }
}
