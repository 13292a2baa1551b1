// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress reporting for enrichment runs.
//!
//! The pipeline reports one [`ProgressUpdate`] per processed asset through a
//! [`ProgressSink`]. Background jobs additionally publish [`ProgressEvent`]s
//! on a `tokio::sync::broadcast` channel so SSE clients can follow along.
//! When no subscriber exists, events are silently dropped.

use crate::model::{EnrichmentFailure, EnrichmentResult};
use serde::{Deserialize, Serialize};

/// Message attached to an asset that resolved to a date.
pub const MSG_ASSET_PROCESSED: &str = "asset processed";
/// Message attached to an asset recorded as a failure.
pub const MSG_ASSET_FAILED: &str = "asset processed with failure";

/// State of a run after one more asset was processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub processed_assets: usize,
    pub total_assets: usize,
    pub current_asset: String,
    /// Everything resolved so far, before date filtering.
    pub results: Vec<EnrichmentResult>,
    pub failures: Vec<EnrichmentFailure>,
    pub message: String,
}

impl ProgressUpdate {
    pub fn asset_failed(&self) -> bool {
        self.message == MSG_ASSET_FAILED
    }
}

/// Receives per-asset progress from a running pipeline.
///
/// Called inline from the run, so implementations must not block for long.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// A progress event published for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    /// Monotonically increasing per job.
    pub seq: u64,
    pub event: ProgressEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// The wallet was read and the run is about to start.
    JobStarted { total_assets: usize },
    AssetProcessed {
        asset: String,
        processed_assets: usize,
        total_assets: usize,
        failed: bool,
        message: String,
    },
    JobCompleted { results: usize, failures: usize },
    JobFailed { error: String },
}

impl ProgressEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobCompleted { .. } | Self::JobFailed { .. })
    }
}

pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Publish an event, ignoring the error raised when nobody listens.
pub fn emit(tx: Option<&ProgressSender>, job_id: &str, seq: u64, event: ProgressEventKind) {
    if let Some(sender) = tx {
        let _ = sender.send(ProgressEvent {
            job_id: job_id.to_string(),
            seq,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent {
            job_id: "job-1".to_string(),
            seq: 3,
            event: ProgressEventKind::AssetProcessed {
                asset: "PETR4".to_string(),
                processed_assets: 2,
                total_assets: 5,
                failed: false,
                message: MSG_ASSET_PROCESSED.to_string(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"]["type"], "AssetProcessed");
        assert_eq!(json["event"]["processed_assets"], 2);
        assert_eq!(json["seq"], 3);
    }

    #[test]
    fn test_emit_without_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        emit(
            Some(&tx),
            "job-1",
            1,
            ProgressEventKind::JobFailed {
                error: "boom".to_string(),
            },
        );
        emit(None, "job-1", 2, ProgressEventKind::JobStarted { total_assets: 0 });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let (tx, mut rx) = channel();
        emit(Some(&tx), "job-9", 1, ProgressEventKind::JobStarted { total_assets: 4 });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id, "job-9");
        assert!(!event.event.is_terminal());
    }
}
