// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run the HTTP API in the foreground.

use crate::config::Config;
use crate::rest;
use crate::service::DataComService;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub async fn run(config: Config) -> Result<()> {
    info!(
        bind = %config.bind,
        base_url = %config.base_url,
        max_jobs = config.max_concurrent_jobs,
        "starting datacom v{}",
        env!("CARGO_PKG_VERSION")
    );
    let service = Arc::new(DataComService::from_config(&config));
    rest::start(config.bind, service).await
}
