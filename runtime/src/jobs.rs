// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-process tracking of background enrichment jobs.
//!
//! A job moves forward only: `pending -> running -> completed | failed`.
//! Every mutation goes through one lock per store, and readers always get
//! a copy of the record, never a reference into the store.

use crate::clock::Clock;
use crate::errors::EnrichError;
use crate::model::{EnrichmentFailure, EnrichmentReport, EnrichmentResult};
use crate::progress::{self, ProgressEventKind, ProgressSender, ProgressSink, ProgressUpdate};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Only forward moves are allowed, and a terminal job never changes.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of one job as seen by pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentJob {
    pub id: String,
    pub status: JobStatus,
    pub total_assets: usize,
    pub processed_assets: usize,
    pub current_asset: Option<String>,
    pub last_message: Option<String>,
    pub results: Vec<EnrichmentResult>,
    pub failures: Vec<EnrichmentFailure>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct JobStore {
    jobs: Mutex<HashMap<String, EnrichmentJob>>,
    clock: Arc<dyn Clock>,
}

impl JobStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Register a new pending job and return its id.
    pub fn create_job(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = self.clock.now();
        let job = EnrichmentJob {
            id: id.clone(),
            status: JobStatus::Pending,
            total_assets: 0,
            processed_assets: 0,
            current_asset: None,
            last_message: Some("job queued".to_string()),
            results: Vec::new(),
            failures: Vec::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().insert(id.clone(), job);
        id
    }

    pub fn mark_running(&self, job_id: &str, total_assets: usize) -> Result<(), EnrichError> {
        self.transition(job_id, JobStatus::Running, |job| {
            job.total_assets = total_assets;
            job.processed_assets = 0;
            job.current_asset = None;
            job.last_message = Some(format!("processing {total_assets} assets"));
        })
    }

    /// Record progress. Never changes the status; `processed_assets` is
    /// capped at the job's total.
    pub fn update_progress(
        &self,
        job_id: &str,
        processed_assets: usize,
        current_asset: Option<String>,
        results: Vec<EnrichmentResult>,
        failures: Vec<EnrichmentFailure>,
        message: impl Into<String>,
    ) -> Result<(), EnrichError> {
        let now = self.clock.now();
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| EnrichError::JobNotFound(job_id.to_string()))?;
        if job.status.is_terminal() {
            return Err(EnrichError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status,
                to: JobStatus::Running,
            });
        }
        job.processed_assets = processed_assets.min(job.total_assets);
        job.current_asset = current_asset;
        job.results = results;
        job.failures = failures;
        job.last_message = Some(message.into());
        job.updated_at = now;
        Ok(())
    }

    pub fn complete_job(&self, job_id: &str, report: EnrichmentReport) -> Result<(), EnrichError> {
        self.transition(job_id, JobStatus::Completed, |job| {
            job.processed_assets = job.total_assets;
            job.current_asset = None;
            job.results = report.results;
            job.failures = report.failures;
            job.last_message = Some("job completed".to_string());
        })
    }

    pub fn fail_job(&self, job_id: &str, error_message: impl Into<String>) -> Result<(), EnrichError> {
        let error_message = error_message.into();
        self.transition(job_id, JobStatus::Failed, |job| {
            job.current_asset = None;
            job.last_message = Some("job failed".to_string());
            job.error_message = Some(error_message);
        })
    }

    /// A copy of the job record.
    pub fn get_job(&self, job_id: &str) -> Option<EnrichmentJob> {
        self.jobs.lock().get(job_id).cloned()
    }

    /// Drop terminal jobs last touched more than `retention` ago.
    pub fn prune(&self, retention: chrono::Duration) -> usize {
        let cutoff = self.clock.now() - retention;
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !(job.status.is_terminal() && job.updated_at < cutoff));
        before - jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn transition(
        &self,
        job_id: &str,
        to: JobStatus,
        apply: impl FnOnce(&mut EnrichmentJob),
    ) -> Result<(), EnrichError> {
        let now = self.clock.now();
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| EnrichError::JobNotFound(job_id.to_string()))?;
        if !job.status.can_transition_to(to) {
            return Err(EnrichError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status,
                to,
            });
        }
        apply(job);
        job.status = to;
        job.updated_at = now;
        info!(job_id, status = %to, "job status changed");
        Ok(())
    }
}

/// Drives one job through its lifecycle and mirrors every step onto the
/// progress broadcast channel.
pub struct ProgressUpdater {
    store: Arc<JobStore>,
    job_id: String,
    events: Option<ProgressSender>,
    seq: AtomicU64,
}

impl ProgressUpdater {
    pub fn new(store: Arc<JobStore>, job_id: impl Into<String>, events: Option<ProgressSender>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
            events,
            seq: AtomicU64::new(0),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn started(&self, total_assets: usize) {
        self.record(self.store.mark_running(&self.job_id, total_assets));
        self.publish(ProgressEventKind::JobStarted { total_assets });
    }

    pub fn completed(&self, report: EnrichmentReport) {
        let event = ProgressEventKind::JobCompleted {
            results: report.results.len(),
            failures: report.failures.len(),
        };
        self.record(self.store.complete_job(&self.job_id, report));
        self.publish(event);
    }

    pub fn failed(&self, error: &str) {
        self.record(self.store.fail_job(&self.job_id, error));
        self.publish(ProgressEventKind::JobFailed {
            error: error.to_string(),
        });
    }

    fn publish(&self, event: ProgressEventKind) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        progress::emit(self.events.as_ref(), &self.job_id, seq, event);
    }

    fn record(&self, outcome: Result<(), EnrichError>) {
        if let Err(e) = outcome {
            warn!(job_id = %self.job_id, "job store rejected update: {e}");
        }
    }
}

impl ProgressSink for ProgressUpdater {
    fn report(&self, update: ProgressUpdate) {
        let event = ProgressEventKind::AssetProcessed {
            asset: update.current_asset.clone(),
            processed_assets: update.processed_assets,
            total_assets: update.total_assets,
            failed: update.asset_failed(),
            message: update.message.clone(),
        };
        self.record(self.store.update_progress(
            &self.job_id,
            update.processed_assets,
            Some(update.current_asset),
            update.results,
            update.failures,
            update.message,
        ));
        self.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    fn store() -> (Arc<ManualClock>, JobStore) {
        let clock = Arc::new(ManualClock::at_date(
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        ));
        let store = JobStore::new(clock.clone());
        (clock, store)
    }

    fn result(asset: &str) -> EnrichmentResult {
        EnrichmentResult {
            asset: asset.to_string(),
            asset_name: String::new(),
            asset_type: "Ações".to_string(),
            date_com: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            last_dividend_value: None,
            details_url: String::new(),
        }
    }

    #[test]
    fn test_lifecycle() {
        let (_, store) = store();
        let id = store.create_job();
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Pending);

        store.mark_running(&id, 2).unwrap();
        store
            .update_progress(&id, 1, Some("PETR4".into()), vec![result("PETR4")], vec![], "asset processed")
            .unwrap();
        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.processed_assets, 1);
        assert_eq!(job.current_asset.as_deref(), Some("PETR4"));

        store
            .complete_job(
                &id,
                EnrichmentReport {
                    results: vec![result("PETR4")],
                    failures: vec![],
                },
            )
            .unwrap();
        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.current_asset, None);
        assert_eq!(job.results.len(), 1);
    }

    #[test]
    fn test_transitions_only_move_forward() {
        let (_, store) = store();
        let id = store.create_job();
        store.mark_running(&id, 1).unwrap();
        store.fail_job(&id, "time budget exceeded").unwrap();

        let err = store.mark_running(&id, 1).unwrap_err();
        assert!(matches!(
            err,
            EnrichError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Running,
                ..
            }
        ));
        assert!(store.complete_job(&id, EnrichmentReport::default()).is_err());
        assert!(store
            .update_progress(&id, 1, None, vec![], vec![], "late")
            .is_err());

        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("time budget exceeded"));
    }

    #[test]
    fn test_progress_is_capped_at_total() {
        let (_, store) = store();
        let id = store.create_job();
        store.mark_running(&id, 2).unwrap();
        store.update_progress(&id, 7, None, vec![], vec![], "x").unwrap();
        assert_eq!(store.get_job(&id).unwrap().processed_assets, 2);
    }

    #[test]
    fn test_get_job_returns_a_copy() {
        let (_, store) = store();
        let id = store.create_job();
        store.mark_running(&id, 3).unwrap();
        let before = store.get_job(&id).unwrap();
        store.update_progress(&id, 2, None, vec![], vec![], "moved").unwrap();
        assert_eq!(before.processed_assets, 0);
        assert_eq!(store.get_job(&id).unwrap().processed_assets, 2);
    }

    #[test]
    fn test_unknown_job() {
        let (_, store) = store();
        assert!(store.get_job("nope").is_none());
        assert!(matches!(
            store.mark_running("nope", 1),
            Err(EnrichError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_prune_drops_old_terminal_jobs_only() {
        let (clock, store) = store();
        let done = store.create_job();
        store.mark_running(&done, 0).unwrap();
        store.complete_job(&done, EnrichmentReport::default()).unwrap();
        let pending = store.create_job();

        clock.advance(chrono::Duration::hours(2));
        assert_eq!(store.prune(chrono::Duration::hours(1)), 1);
        assert!(store.get_job(&done).is_none());
        assert!(store.get_job(&pending).is_some());
    }

    #[tokio::test]
    async fn test_updater_publishes_events() {
        let (_, store) = store();
        let store = Arc::new(store);
        let id = store.create_job();
        let (tx, mut rx) = progress::channel();
        let updater = ProgressUpdater::new(store.clone(), id.clone(), Some(tx));

        updater.started(1);
        updater.report(ProgressUpdate {
            processed_assets: 1,
            total_assets: 1,
            current_asset: "VALE3".into(),
            results: vec![],
            failures: vec![EnrichmentFailure::new("VALE3", "no dividend date found")],
            message: progress::MSG_ASSET_FAILED.into(),
        });
        updater.completed(EnrichmentReport::default());

        let seqs: Vec<u64> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| e.seq)
        .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Completed);
    }
}
