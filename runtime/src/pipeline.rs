// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Enrichment run over a set of wallet tables.
//!
//! Assets are resolved strictly one after another: the browser session and
//! the time budget are both mutated per step. The session is opened at most
//! once per run and released on every exit path.

use crate::budget::TimeBudget;
use crate::clock::Clock;
use crate::errors::EnrichError;
use crate::model::{
    count_assets, AssetTable, EnrichmentFailure, EnrichmentReport, EnrichmentResult,
};
use crate::progress::{ProgressSink, ProgressUpdate, MSG_ASSET_FAILED, MSG_ASSET_PROCESSED};
use crate::renderer::{BrowserSession, Renderer};
use crate::resolver::{DividendDateResolver, Resolution};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct EnrichmentPipeline {
    resolver: Arc<DividendDateResolver>,
    renderer: Arc<dyn Renderer>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct RunState {
    results: Vec<EnrichmentResult>,
    failures: Vec<EnrichmentFailure>,
    processed: usize,
}

impl EnrichmentPipeline {
    pub fn new(
        resolver: Arc<DividendDateResolver>,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            renderer,
            clock,
        }
    }

    /// Resolve every asset of `tables` within `budget`.
    ///
    /// Returns upcoming dates only, sorted ascending with ties kept in row
    /// order, plus every per-asset failure. Fails as a whole with
    /// [`EnrichError::BudgetExceeded`] when the budget runs out mid-run.
    pub async fn run(
        &self,
        tables: &[AssetTable],
        budget: &TimeBudget,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<EnrichmentReport, EnrichError> {
        let total = count_assets(tables);
        info!(tables = tables.len(), assets = total, "enrichment run started");

        let mut session = BrowserSession::new(Arc::clone(&self.renderer));
        let mut state = RunState::default();
        let outcome = self
            .resolve_all(tables, budget, progress, total, &mut session, &mut state)
            .await;
        session.release().await;

        if let Err(e) = outcome {
            warn!(
                processed = state.processed,
                total,
                elapsed_ms = budget.elapsed().as_millis() as u64,
                "enrichment run aborted: {e}"
            );
            return Err(e);
        }

        let report = self.finish(state);
        info!(
            results = report.results.len(),
            failures = report.failures.len(),
            elapsed_ms = budget.elapsed().as_millis() as u64,
            "enrichment run finished"
        );
        Ok(report)
    }

    async fn resolve_all(
        &self,
        tables: &[AssetTable],
        budget: &TimeBudget,
        progress: Option<&dyn ProgressSink>,
        total: usize,
        session: &mut BrowserSession,
        state: &mut RunState,
    ) -> Result<(), EnrichError> {
        for table in tables {
            if let Some(error) = &table.error {
                debug!(table = %table.table_name, "skipping unreadable table: {error}");
                continue;
            }

            for row in table.resolvable_rows() {
                let Some(code) = row.code() else { continue };

                let resolution = self
                    .resolver
                    .resolve(code, &table.table_name, budget, session)
                    .await?;

                let message = match resolution {
                    Resolution::Found(found) => {
                        state.results.push(EnrichmentResult {
                            asset: code.to_string(),
                            asset_name: row.name().unwrap_or_default().to_string(),
                            asset_type: found.category.display_name().to_string(),
                            date_com: found.snapshot.date_com,
                            last_dividend_value: found.snapshot.last_value,
                            details_url: found.details_url,
                        });
                        MSG_ASSET_PROCESSED
                    }
                    Resolution::Failed(reason) => {
                        debug!(asset = code, %reason, "asset not resolved");
                        state.failures.push(EnrichmentFailure::new(code, reason));
                        MSG_ASSET_FAILED
                    }
                };
                state.processed += 1;

                if let Some(sink) = progress {
                    sink.report(ProgressUpdate {
                        processed_assets: state.processed,
                        total_assets: total,
                        current_asset: code.to_string(),
                        results: state.results.clone(),
                        failures: state.failures.clone(),
                        message: message.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn finish(&self, state: RunState) -> EnrichmentReport {
        let today = self.clock.today();
        let mut results: Vec<EnrichmentResult> = state
            .results
            .into_iter()
            .filter(|r| r.date_com >= today)
            .collect();
        // Stable: equal dates keep row order.
        results.sort_by_key(|r| r.date_com);
        EnrichmentReport {
            results,
            failures: state.failures,
        }
    }
}
