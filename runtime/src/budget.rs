// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wall-clock budget for a single enrichment run.
//!
//! A run gets one deadline. Every network fetch, browser navigation and
//! DOM wait derives its own timeout from what is left via
//! [`TimeBudget::clamp_timeout`], and every per-asset iteration checks
//! [`TimeBudget::ensure_time_available`] before starting. Collaborators may
//! overrun the timeout they were handed, so each step is also cut off at
//! the deadline itself with [`TimeBudget::within`]. When the budget runs dry
//! the run stops with [`BudgetExceeded`] instead of hanging.
//!
//! Uses `tokio::time::Instant` so tests can drive it with a paused clock.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Budget used when the caller passes a non-positive number of seconds.
pub const DEFAULT_BUDGET_SECS: i64 = 60;

/// Smallest timeout handed out by [`TimeBudget::clamp_timeout`].
const MIN_SUB_TIMEOUT: Duration = Duration::from_secs(1);

/// Not enough time left for the next unit of work.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("time budget exceeded while processing {context}")]
pub struct BudgetExceeded {
    /// What was about to run when the budget ran out.
    pub context: String,
}

impl BudgetExceeded {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

/// One deadline, many derived sub-timeouts.
#[derive(Debug, Clone)]
pub struct TimeBudget {
    started_at: Instant,
    deadline: Instant,
}

impl TimeBudget {
    /// Start a budget of `total_seconds`, falling back to
    /// [`DEFAULT_BUDGET_SECS`] for zero or negative input.
    pub fn from_secs(total_seconds: i64) -> Self {
        let secs = if total_seconds > 0 {
            total_seconds
        } else {
            DEFAULT_BUDGET_SECS
        };
        Self::with_duration(Duration::from_secs(secs as u64))
    }

    /// Start a budget of exactly `total`.
    pub fn with_duration(total: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: started_at + total,
        }
    }

    /// Time left before the deadline, never negative.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn remaining_seconds(&self) -> f64 {
        self.remaining().as_secs_f64()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Drive `fut` to completion unless the deadline passes first.
    pub async fn within<F: Future>(&self, context: &str, fut: F) -> Result<F::Output, BudgetExceeded> {
        tokio::time::timeout_at(self.deadline, fut)
            .await
            .map_err(|_| BudgetExceeded::new(context))
    }

    /// Fail when less than `min_required` is left.
    pub fn ensure_time_available(
        &self,
        min_required: Duration,
        context: &str,
    ) -> Result<(), BudgetExceeded> {
        if self.remaining() < min_required {
            return Err(BudgetExceeded::new(context));
        }
        Ok(())
    }

    /// Derive a sub-timeout: `max(1s, min(requested, remaining))`.
    ///
    /// Fails once nothing is left at all.
    pub fn clamp_timeout(&self, requested: Duration) -> Result<Duration, BudgetExceeded> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(BudgetExceeded::new("sub-operation timeout"));
        }
        Ok(requested.min(remaining).max(MIN_SUB_TIMEOUT))
    }
}
