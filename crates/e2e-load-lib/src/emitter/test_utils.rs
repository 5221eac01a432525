// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    rpc::{EndpointClient, SyncInfo},
    transaction_generator::Transaction,
};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    Accept,
    CatchingUp,
    StatusDown,
    Reject,
    /// Never answers the status query.
    Stall,
}

pub struct MockClient {
    name: String,
    behavior: Behavior,
    pub broadcasts: Arc<AtomicUsize>,
}

impl MockClient {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            broadcasts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn boxed(self) -> Box<dyn EndpointClient> {
        Box::new(self)
    }
}

#[async_trait]
impl EndpointClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> Result<SyncInfo> {
        match self.behavior {
            Behavior::StatusDown => bail!("{} is down", self.name),
            Behavior::Stall => futures::future::pending().await,
            behavior => Ok(SyncInfo {
                catching_up: behavior == Behavior::CatchingUp,
            }),
        }
    }

    async fn broadcast_tx_sync(&self, _txn: &Transaction) -> Result<()> {
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::Reject {
            bail!("{} rejected the transaction", self.name);
        }
        Ok(())
    }
}

/// Polls the condition until it holds, panicking after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
