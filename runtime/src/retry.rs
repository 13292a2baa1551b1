// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry with exponential backoff.
//!
//! Independent of what is being retried: the HTTP client uses it for 5xx
//! and transport errors, the browser path uses it for stale DOM reads.

use crate::budget::{BudgetExceeded, TimeBudget};
use std::future::Future;
use std::time::Duration;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff: Duration::from_secs(10),
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Delay after the given 1-based failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts run out. The last error is returned.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let delay = self.backoff_for(attempt);
                    tracing::debug!(attempt, max_attempts, ?delay, "retrying after error: {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// [`run`](Self::run) inside a time budget.
    ///
    /// Each attempt is handed `budget.clamp_timeout(per_attempt)` and is
    /// dropped if still running at the deadline; backoffs never sleep past
    /// it. Only running out of budget is an `Err`, the operation's own
    /// outcome comes back inside `Ok`.
    pub async fn run_within<T, E, F, Fut, P>(
        &self,
        budget: &TimeBudget,
        context: &str,
        per_attempt: Duration,
        mut op: F,
        is_retryable: P,
    ) -> Result<Result<T, E>, BudgetExceeded>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let timeout = budget
                .clamp_timeout(per_attempt)
                .map_err(|_| BudgetExceeded::new(context))?;
            match budget.within(context, op(timeout)).await? {
                Ok(value) => return Ok(Ok(value)),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let delay = self.backoff_for(attempt).min(budget.remaining());
                    tracing::debug!(attempt, max_attempts, ?delay, "retrying after error: {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Ok(Err(e)),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
