// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    emitter::{
        client_ring::ClientRing,
        observer::{LoadObserver, SoftFailure},
    },
    rpc::EndpointClient,
    transaction_generator::Transaction,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Takes transactions off the shared channel and submits each of them to the
/// next node of its ring.
pub struct SubmissionWorker {
    index: usize,
    ring: ClientRing,
    txns: async_channel::Receiver<Transaction>,
    success_sender: mpsc::Sender<u64>,
    token: CancellationToken,
    observer: Arc<dyn LoadObserver>,
    /// Successes since the last report.
    successes: u64,
}

impl SubmissionWorker {
    pub fn new(
        index: usize,
        ring: ClientRing,
        txns: async_channel::Receiver<Transaction>,
        success_sender: mpsc::Sender<u64>,
        token: CancellationToken,
        observer: Arc<dyn LoadObserver>,
    ) -> Self {
        Self {
            index,
            ring,
            txns,
            success_sender,
            token,
            observer,
            successes: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let txn = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                txn = self.txns.recv() => match txn {
                    Ok(txn) => txn,
                    Err(_) => {
                        // The generator is gone, stay idle until the load is over.
                        self.token.cancelled().await;
                        break;
                    },
                },
            };

            let client = self.ring.advance();
            let submitted = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                submitted = submit_transaction(client, self.observer.as_ref(), &txn) => submitted,
            };
            if !submitted {
                continue;
            }

            self.successes += 1;
            if self.token.is_cancelled() {
                break;
            }
            self.report_successes();
        }
        debug!(worker = self.index, "submission worker stopped");
    }

    /// Never waits on the aggregator: when it isn't ready for the report, the
    /// count keeps accumulating and is sent after the next success.
    fn report_successes(&mut self) {
        if self.success_sender.try_send(self.successes).is_ok() {
            self.successes = 0;
        }
    }
}

/// Returns whether the node accepted the transaction. Failures are skipped,
/// the next transaction simply goes to the next node of the ring.
async fn submit_transaction(
    client: &dyn EndpointClient,
    observer: &dyn LoadObserver,
    txn: &Transaction,
) -> bool {
    match client.status().await {
        Err(_) => {
            observer.soft_failure(client.name(), SoftFailure::StatusUnavailable);
            return false;
        },
        Ok(sync_info) if sync_info.catching_up => {
            observer.soft_failure(client.name(), SoftFailure::CatchingUp);
            return false;
        },
        Ok(_) => {},
    }

    if client.broadcast_tx_sync(txn).await.is_err() {
        observer.soft_failure(client.name(), SoftFailure::SubmissionRejected);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{
        observer::MetricsObserver,
        test_utils::{Behavior, MockClient, wait_until},
    };
    use prometheus::Registry;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::task::JoinHandle;

    struct Harness {
        txn_sender: async_channel::Sender<Transaction>,
        success_receiver: mpsc::Receiver<u64>,
        token: CancellationToken,
        metrics: Arc<MetricsObserver>,
        handle: JoinHandle<()>,
    }

    fn spawn_worker(clients: Vec<MockClient>) -> Harness {
        let (txn_sender, txn_receiver) = async_channel::bounded(1);
        let (success_sender, success_receiver) = mpsc::channel(1);
        let token = CancellationToken::new();
        let metrics = Arc::new(MetricsObserver::new(&Registry::new()).unwrap());
        let ring = ClientRing::new(clients.into_iter().map(MockClient::boxed).collect()).unwrap();
        let worker = SubmissionWorker::new(
            0,
            ring,
            txn_receiver,
            success_sender,
            token.clone(),
            metrics.clone(),
        );
        Harness {
            txn_sender,
            success_receiver,
            token,
            metrics,
            handle: tokio::spawn(worker.run()),
        }
    }

    fn txn() -> Transaction {
        Transaction::new(&b"load-0=00"[..])
    }

    fn counter(client: &MockClient) -> Arc<AtomicUsize> {
        client.broadcasts.clone()
    }

    #[tokio::test]
    async fn test_round_robin_across_ring() {
        let clients = vec![
            MockClient::new("a", Behavior::Accept),
            MockClient::new("b", Behavior::Accept),
            MockClient::new("c", Behavior::Accept),
        ];
        let counters: Vec<_> = clients.iter().map(counter).collect();
        let mut harness = spawn_worker(clients);

        let mut total = 0;
        for _ in 0..7 {
            harness.txn_sender.send(txn()).await.unwrap();
            total += harness.success_receiver.recv().await.unwrap();
        }
        assert_eq!(total, 7);
        let counts: Vec<_> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
        assert_eq!(counts, vec![3, 2, 2]);

        harness.token.cancel();
        harness.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_soft_failures_are_skipped() {
        let clients = vec![
            MockClient::new("down", Behavior::StatusDown),
            MockClient::new("syncing", Behavior::CatchingUp),
            MockClient::new("rejecting", Behavior::Reject),
            MockClient::new("good", Behavior::Accept),
        ];
        let mut harness = spawn_worker(clients);

        // One full turn of the ring per round, the good node comes last.
        for _ in 0..2 {
            for _ in 0..4 {
                harness.txn_sender.send(txn()).await.unwrap();
            }
            assert_eq!(harness.success_receiver.recv().await, Some(1));
        }

        let metrics = &harness.metrics;
        assert_eq!(metrics.soft_failures(SoftFailure::StatusUnavailable), 2);
        assert_eq!(metrics.soft_failures(SoftFailure::CatchingUp), 2);
        assert_eq!(metrics.soft_failures(SoftFailure::SubmissionRejected), 2);

        harness.token.cancel();
        harness.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreported_successes_accumulate() {
        let client = MockClient::new("a", Behavior::Accept);
        let broadcasts = counter(&client);
        let mut harness = spawn_worker(vec![client]);

        // Nobody reads the reports while these are submitted, only the first
        // one fits in the channel.
        for _ in 0..5 {
            harness.txn_sender.send(txn()).await.unwrap();
        }
        wait_until(|| broadcasts.load(Ordering::SeqCst) == 5).await;

        let mut reports = vec![];
        for _ in 0..100 {
            while let Ok(report) = harness.success_receiver.try_recv() {
                reports.push(report);
            }
            let submitted = broadcasts.load(Ordering::SeqCst);
            if reports.iter().sum::<u64>() == submitted as u64 {
                break;
            }
            harness.txn_sender.send(txn()).await.unwrap();
            wait_until(|| broadcasts.load(Ordering::SeqCst) > submitted).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(
            reports.iter().sum::<u64>(),
            broadcasts.load(Ordering::SeqCst) as u64
        );
        assert_eq!(reports[0], 1);
        assert!(reports.iter().any(|report| *report >= 4), "{:?}", reports);

        harness.token.cancel();
        harness.handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_request() {
        let mut harness = spawn_worker(vec![MockClient::new("stuck", Behavior::Stall)]);
        harness.txn_sender.send(txn()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!harness.handle.is_finished());

        harness.token.cancel();
        tokio::time::timeout(Duration::from_secs(1), &mut harness.handle)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert!(harness.success_receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_idles_until_cancel() {
        let harness = spawn_worker(vec![MockClient::new("a", Behavior::Accept)]);
        harness.txn_sender.close();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!harness.handle.is_finished());

        harness.token.cancel();
        tokio::time::timeout(Duration::from_secs(1), harness.handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
