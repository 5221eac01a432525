// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Sinks the load reports its progress to. They are handed to the emitter
//! explicitly, nothing here is process wide.

use crate::{emitter::LoadOutcome, error::LoadError, testnet::Node};
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per transaction failures, skipped by the workers without a retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoftFailure {
    StatusUnavailable,
    CatchingUp,
    SubmissionRejected,
}

impl SoftFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoftFailure::StatusUnavailable => "status_unavailable",
            SoftFailure::CatchingUp => "catching_up",
            SoftFailure::SubmissionRejected => "submission_rejected",
        }
    }
}

pub trait LoadObserver: Send + Sync {
    fn load_started(&self, _testnet: &str, _workers: usize, _nodes: usize, _tx_size: usize) {}

    fn endpoint_excluded(&self, _worker: usize, _node: &Node, _error: &anyhow::Error) {}

    fn soft_failure(&self, _endpoint: &str, _failure: SoftFailure) {}

    fn successes_reported(&self, _delta: u64) {}

    fn load_finished(&self, _result: &Result<LoadOutcome, LoadError>) {}
}

/// Logs the start and the end of the load. Per transaction failures are
/// expected while a testnet warms up, so they are not logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn load_started(&self, testnet: &str, workers: usize, nodes: usize, tx_size: usize) {
        info!(testnet, workers, nodes, tx = tx_size, "starting transaction load");
    }

    fn endpoint_excluded(&self, worker: usize, node: &Node, error: &anyhow::Error) {
        warn!(
            worker,
            node = %node.name,
            mode = %node.mode,
            "Excluding endpoint {} from the worker's rotation: {:#}",
            node.rpc_address,
            error
        );
    }

    fn load_finished(&self, result: &Result<LoadOutcome, LoadError>) {
        match result {
            Ok(outcome) => info!(
                dur_secs = outcome.elapsed.as_secs_f64(),
                txns = outcome.successes,
                workers = outcome.workers,
                rate = outcome.rate,
                "ending transaction load"
            ),
            Err(error) => error!("transaction load failed: {}", error),
        }
    }
}

/// Counts the load on a caller provided registry.
#[derive(Clone, Debug)]
pub struct MetricsObserver {
    workers: IntGauge,
    successes: IntCounter,
    soft_failures: IntCounterVec,
    excluded_endpoints: IntCounter,
}

impl MetricsObserver {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let workers = IntGauge::with_opts(Opts::new(
            "e2e_load_workers",
            "Number of submission workers of the current load",
        ))?;
        let successes = IntCounter::with_opts(Opts::new(
            "e2e_load_successful_transactions_total",
            "Transactions accepted into the mempool of a node",
        ))?;
        let soft_failures = IntCounterVec::new(
            Opts::new(
                "e2e_load_skipped_transactions_total",
                "Transactions skipped by a worker, by reason",
            ),
            &["reason"],
        )?;
        let excluded_endpoints = IntCounter::with_opts(Opts::new(
            "e2e_load_excluded_endpoints_total",
            "Endpoints left out of a worker's rotation because no client could be built",
        ))?;

        registry.register(Box::new(workers.clone()))?;
        registry.register(Box::new(successes.clone()))?;
        registry.register(Box::new(soft_failures.clone()))?;
        registry.register(Box::new(excluded_endpoints.clone()))?;

        Ok(Self {
            workers,
            successes,
            soft_failures,
            excluded_endpoints,
        })
    }

    pub fn successes(&self) -> u64 {
        self.successes.get()
    }

    pub fn soft_failures(&self, failure: SoftFailure) -> u64 {
        self.soft_failures
            .with_label_values(&[failure.as_str()])
            .get()
    }
}

impl LoadObserver for MetricsObserver {
    fn load_started(&self, _testnet: &str, workers: usize, _nodes: usize, _tx_size: usize) {
        self.workers.set(workers as i64);
    }

    fn endpoint_excluded(&self, _worker: usize, _node: &Node, _error: &anyhow::Error) {
        self.excluded_endpoints.inc();
    }

    fn soft_failure(&self, _endpoint: &str, failure: SoftFailure) {
        self.soft_failures
            .with_label_values(&[failure.as_str()])
            .inc();
    }

    fn successes_reported(&self, delta: u64) {
        self.successes.inc_by(delta);
    }
}

/// Forwards everything to each of the inner observers, in order.
#[derive(Clone, Default)]
pub struct ObserverFanout(Vec<Arc<dyn LoadObserver>>);

impl ObserverFanout {
    pub fn new(observers: Vec<Arc<dyn LoadObserver>>) -> Self {
        Self(observers)
    }
}

impl LoadObserver for ObserverFanout {
    fn load_started(&self, testnet: &str, workers: usize, nodes: usize, tx_size: usize) {
        for observer in &self.0 {
            observer.load_started(testnet, workers, nodes, tx_size);
        }
    }

    fn endpoint_excluded(&self, worker: usize, node: &Node, error: &anyhow::Error) {
        for observer in &self.0 {
            observer.endpoint_excluded(worker, node, error);
        }
    }

    fn soft_failure(&self, endpoint: &str, failure: SoftFailure) {
        for observer in &self.0 {
            observer.soft_failure(endpoint, failure);
        }
    }

    fn successes_reported(&self, delta: u64) {
        for observer in &self.0 {
            observer.successes_reported(delta);
        }
    }

    fn load_finished(&self, result: &Result<LoadOutcome, LoadError>) {
        for observer in &self.0 {
            observer.load_finished(result);
        }
    }
}
