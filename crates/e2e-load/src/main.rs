// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use e2e_load_lib::{
    LoadArgs, LoadObserver, MetricsObserver, ObserverFanout, TestnetArgs, TracingObserver,
    run_load_with_args,
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::{io, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Sends random key-value transactions to the nodes of a testnet and reports
/// how many of them went through.
#[derive(Debug, Parser)]
#[clap(name = "e2e-load", author, version)]
struct Args {
    #[clap(flatten)]
    testnet_args: TestnetArgs,

    #[clap(flatten)]
    load_args: LoadArgs,

    #[clap(long, help = "Print the load metrics in the Prometheus text format at the end")]
    print_metrics: bool,
}

fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let registry = Registry::new();
    let metrics = MetricsObserver::new(&registry).context("Failed to register metrics")?;
    let observers: Vec<Arc<dyn LoadObserver>> = vec![Arc::new(TracingObserver), Arc::new(metrics)];
    let observer = Arc::new(ObserverFanout::new(observers));

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl-C: {}", error);
                return;
            }
            info!("interrupted, stopping the load");
            token.cancel();
        });
    }

    let result = run_load_with_args(token, &args.testnet_args, &args.load_args, observer).await;

    if args.print_metrics {
        let mut buffer = vec![];
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        print!("{}", String::from_utf8_lossy(&buffer));
    }

    let outcome = result?;
    println!("{}", outcome);
    Ok(())
}
