// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::config::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Errors that end a load run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("worker {worker} has no usable endpoints to submit load to")]
    NoUsableEndpoints { worker: usize },
    #[error("failed to read random bytes: {0}")]
    Randomness(#[from] rand::Error),
    #[error("failed to submit transactions in {elapsed:?} by {workers} workers")]
    NoSuccessfulTransactions { elapsed: Duration, workers: usize },
    #[error("failed to build the RPC client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid load setup: {0}")]
    Config(#[from] ConfigError),
    #[error("load task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for LoadError {
    fn from(error: tokio::task::JoinError) -> Self {
        LoadError::Task(error.to_string())
    }
}
