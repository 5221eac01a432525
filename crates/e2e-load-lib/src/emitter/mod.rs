// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

pub mod client_ring;
pub mod observer;
pub mod submission_worker;
#[cfg(test)]
pub(crate) mod test_utils;

use crate::{
    config::LoadConfig,
    emitter::{
        client_ring::build_client_ring,
        observer::{LoadObserver, TracingObserver},
        submission_worker::SubmissionWorker,
    },
    error::LoadError,
    rpc::{Connector, HttpConnector},
    testnet::Testnet,
    transaction_generator::{KvTransactionGenerator, TransactionGenerator, generate_load},
};
use std::{
    cmp::min,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Since transactions are executed across all nodes in the network, the load
/// has to shrink for larger networks to avoid using too much CPU. This gives
/// high-throughput small networks and low-throughput large ones. It also
/// bounds the number of connections, since each worker has a client to every
/// usable node.
pub fn worker_count(nodes: usize, config: &LoadConfig) -> usize {
    min(nodes.saturating_mul(config.workers_per_node), config.max_workers)
}

/// What a load that managed to get transactions through achieved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadOutcome {
    pub elapsed: Duration,
    pub successes: u64,
    pub workers: usize,
    /// Successful transactions per second.
    pub rate: f64,
}

impl LoadOutcome {
    fn new(elapsed: Duration, successes: u64, workers: usize) -> Self {
        Self {
            elapsed,
            successes,
            workers,
            rate: successes as f64 / elapsed.as_secs_f64(),
        }
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted {} txns in {:.3}s with {} workers: {:.2} txn/s",
            self.successes,
            self.elapsed.as_secs_f64(),
            self.workers,
            self.rate
        )
    }
}

/// Runs one generator and a pool of submission workers against a testnet.
pub struct LoadEmitter {
    testnet: Testnet,
    config: LoadConfig,
    connector: Option<Arc<dyn Connector>>,
    observer: Arc<dyn LoadObserver>,
    generator: Option<Box<dyn TransactionGenerator>>,
}

impl LoadEmitter {
    pub fn new(testnet: Testnet) -> Self {
        Self {
            testnet,
            config: LoadConfig::default(),
            connector: None,
            observer: Arc::new(TracingObserver),
            generator: None,
        }
    }

    pub fn config(mut self, config: LoadConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to JSON-RPC over HTTP.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Defaults to key-value transactions of the testnet's size.
    pub fn transaction_generator(mut self, generator: Box<dyn TransactionGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Generates load until the token is cancelled.
    ///
    /// Fails if not a single transaction went through by then. There is no
    /// check for stalls here: a stall would abort the load sooner and could
    /// hide backpressure from the network, so bounding the run is up to
    /// whoever holds the token.
    pub async fn run(self, token: CancellationToken) -> Result<LoadOutcome, LoadError> {
        let observer = self.observer.clone();
        let result = self.emit(token).await;
        observer.load_finished(&result);
        result
    }

    /// Generates load for the given duration.
    pub async fn run_for(self, duration: Duration) -> Result<LoadOutcome, LoadError> {
        let token = CancellationToken::new();
        let timer = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                token.cancel();
            })
        };
        let result = self.run(token).await;
        timer.abort();
        result
    }

    async fn emit(self, token: CancellationToken) -> Result<LoadOutcome, LoadError> {
        let Self {
            testnet,
            config,
            connector,
            observer,
            generator,
        } = self;
        // The caller's budget covers the setup as well.
        let started = Instant::now();
        config.sanitize()?;
        testnet.sanitize()?;
        let connector: Arc<dyn Connector> = match connector {
            Some(connector) => connector,
            None => Arc::new(HttpConnector::new(config.rpc_timeout())?),
        };

        let workers = worker_count(testnet.nodes.len(), &config);
        let mut rings = Vec::with_capacity(workers);
        for worker in 0..workers {
            if token.is_cancelled() {
                return Err(LoadError::NoSuccessfulTransactions {
                    elapsed: started.elapsed(),
                    workers,
                });
            }
            rings.push(build_client_ring(
                worker,
                &testnet,
                connector.as_ref(),
                observer.as_ref(),
            )?);
            // Connectors are synchronous, give the runtime a chance to run
            // whatever may cancel the load.
            tokio::task::yield_now().await;
        }
        let generator: Box<dyn TransactionGenerator> = match generator {
            Some(generator) => generator,
            None => Box::new(KvTransactionGenerator::new(testnet.tx_size, config)?),
        };

        // Everything spawned below is cancelled on the way out, however the
        // load ends.
        let token = token.child_token();
        let (txn_sender, txn_receiver) = async_channel::bounded(1);
        let (success_sender, mut success_receiver) = mpsc::channel(1);

        observer.load_started(&testnet.name, workers, testnet.nodes.len(), testnet.tx_size);

        let mut tasks = JoinSet::new();
        tasks.spawn(generate_load(token.clone(), generator, txn_sender));
        for (index, ring) in rings.into_iter().enumerate() {
            let worker = SubmissionWorker::new(
                index,
                ring,
                txn_receiver.clone(),
                success_sender.clone(),
                token.clone(),
                observer.clone(),
            );
            tasks.spawn(async move {
                worker.run().await;
                Ok(())
            });
        }
        drop(txn_receiver);
        drop(success_sender);

        let result = aggregate(
            &token,
            &mut success_receiver,
            &mut tasks,
            observer.as_ref(),
            started,
            workers,
        )
        .await;

        token.cancel();
        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined.map_err(LoadError::from).and_then(|result| result) {
                debug!("load task ended with an error after the load: {}", error);
            }
        }
        result
    }
}

async fn aggregate(
    token: &CancellationToken,
    success_receiver: &mut mpsc::Receiver<u64>,
    tasks: &mut JoinSet<Result<(), LoadError>>,
    observer: &dyn LoadObserver,
    started: Instant,
    workers: usize,
) -> Result<LoadOutcome, LoadError> {
    let mut success = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            Some(delta) = success_receiver.recv() => {
                success += delta;
                observer.successes_reported(delta);
            },
            Some(joined) = tasks.join_next() => {
                // Tasks only return early on fatal errors.
                joined??;
            },
        }
    }

    // Reports the workers already handed over still count.
    while let Ok(delta) = success_receiver.try_recv() {
        success += delta;
        observer.successes_reported(delta);
    }

    let elapsed = started.elapsed();
    if success == 0 {
        return Err(LoadError::NoSuccessfulTransactions { elapsed, workers });
    }
    Ok(LoadOutcome::new(elapsed, success, workers))
}
