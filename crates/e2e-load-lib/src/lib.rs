// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod args;
mod config;
pub mod emitter;
mod error;
pub mod rpc;
mod testnet;
pub mod transaction_generator;
mod wrappers;

// These are the top level things you should need to run the load.
pub use args::{LoadArgs, TestnetArgs};
pub use wrappers::{run_load, run_load_with_args};

// We export these if you want finer grained control.
pub use config::{ConfigError, LoadConfig, PersistableConfig};
pub use emitter::{
    LoadEmitter, LoadOutcome,
    observer::{LoadObserver, MetricsObserver, ObserverFanout, SoftFailure, TracingObserver},
    worker_count,
};
pub use error::LoadError;
pub use rpc::{Connector, EndpointClient, HttpConnector, HttpRpcClient, SyncInfo};
pub use testnet::{Mode, Node, Testnet};
pub use transaction_generator::{KvTransactionGenerator, Transaction, TransactionGenerator};
