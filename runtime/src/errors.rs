// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Errors that end an enrichment request or job.
//!
//! Per-asset problems never show up here: they are recorded as
//! [`EnrichmentFailure`](crate::model::EnrichmentFailure)s and the run goes on.

use crate::budget::BudgetExceeded;
use crate::jobs::JobStatus;

#[derive(thiserror::Error, Debug)]
pub enum EnrichError {
    /// The run ran out of time; remaining assets were not attempted.
    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    /// Reading the wallet tables failed, so there is nothing to enrich.
    #[error("failed to extract wallet assets: {0}")]
    UpstreamExtraction(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EnrichError {
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, Self::BudgetExceeded(_))
    }
}
