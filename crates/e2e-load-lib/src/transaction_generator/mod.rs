// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::error::LoadError;
use bytes::Bytes;
use std::{fmt, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod kv_transaction_generator;

pub use kv_transaction_generator::{KvTransactionGenerator, load_generate_wait_time};

/// An opaque transaction, submitted as is to the nodes under test.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Transaction(Bytes);

impl Transaction {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Transaction {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transaction({})", String::from_utf8_lossy(&self.0))
    }
}

pub trait TransactionGenerator: Send {
    /// Errors returned here are fatal to the whole run.
    fn generate_transaction(&mut self) -> Result<Transaction, LoadError>;

    /// How long to pause after a transaction was handed off.
    fn wait_time(&mut self) -> Duration;
}

/// Generates transactions until the token is cancelled.
///
/// The channel has multiple consumers, thus the rate of the load is
/// primarily the result of backpressure from the nodes accepting the
/// transactions, though there is still some timer-based limiting.
///
/// The channel is closed on the way out, whatever the reason, so that the
/// workers see the end of the stream.
pub async fn generate_load(
    token: CancellationToken,
    mut generator: Box<dyn TransactionGenerator>,
    sender: async_channel::Sender<Transaction>,
) -> Result<(), LoadError> {
    let result = generate_until_cancelled(&token, generator.as_mut(), &sender).await;
    sender.close();
    debug!("transaction generator stopped");
    result
}

async fn generate_until_cancelled(
    token: &CancellationToken,
    generator: &mut dyn TransactionGenerator,
    sender: &async_channel::Sender<Transaction>,
) -> Result<(), LoadError> {
    loop {
        let txn = generator.generate_transaction()?;

        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            sent = sender.send(txn) => {
                if sent.is_err() {
                    // Every worker is gone, nobody is left to take load.
                    return Ok(());
                }
            },
        }

        let wait = generator.wait_time();
        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            _ = tokio::time::sleep(wait) => {},
        }
    }
}
