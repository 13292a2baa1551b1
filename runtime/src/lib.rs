// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Datacom runtime library: upcoming ex-dividend dates for investment
//! wallets, resolved under a single wall-clock budget per run.
//!
//! This library crate exposes the core modules for integration testing.

pub mod acquisition;
pub mod budget;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod renderer;
pub mod resolver;
pub mod rest;
pub mod retry;
pub mod service;
