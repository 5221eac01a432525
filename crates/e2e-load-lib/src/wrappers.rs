// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    args::{LoadArgs, TestnetArgs},
    emitter::{LoadEmitter, LoadOutcome, observer::LoadObserver},
    error::LoadError,
    testnet::Testnet,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sends load to the testnet over JSON-RPC until the token is cancelled.
pub async fn run_load(
    token: CancellationToken,
    testnet: &Testnet,
) -> Result<LoadOutcome, LoadError> {
    LoadEmitter::new(testnet.clone()).run(token).await
}

/// Runs the load the command line describes. It stops on the first of the
/// token being cancelled and the requested duration running out.
pub async fn run_load_with_args(
    token: CancellationToken,
    testnet_args: &TestnetArgs,
    load_args: &LoadArgs,
    observer: Arc<dyn LoadObserver>,
) -> Result<LoadOutcome> {
    let testnet = testnet_args
        .to_testnet()
        .context("Failed to build testnet")?;
    let config = load_args
        .load_config()
        .context("Failed to load config")?;

    let token = token.child_token();
    let timer = load_args.duration().map(|duration| {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            token.cancel();
        })
    });

    let result = LoadEmitter::new(testnet)
        .config(config)
        .observer(observer)
        .run(token)
        .await;
    if let Some(timer) = timer {
        timer.abort();
    }
    Ok(result?)
}
