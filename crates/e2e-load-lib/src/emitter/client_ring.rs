// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    emitter::observer::LoadObserver,
    error::LoadError,
    rpc::{Connector, EndpointClient},
    testnet::Testnet,
};
use std::fmt;

/// The clients of one worker, used in a round-robin fashion.
///
/// The order is fixed when the ring is built and it never grows or shrinks.
pub struct ClientRing {
    clients: Vec<Box<dyn EndpointClient>>,
    position: usize,
}

impl ClientRing {
    /// Returns `None` when there are no clients to rotate through.
    pub fn new(clients: Vec<Box<dyn EndpointClient>>) -> Option<Self> {
        if clients.is_empty() {
            return None;
        }
        // Starting on the last client, the first advance lands on the first one.
        let position = clients.len() - 1;
        Some(Self { clients, position })
    }

    /// Moves the ring by one and returns the client it now points to.
    pub fn advance(&mut self) -> &dyn EndpointClient {
        self.position = (self.position + 1) % self.clients.len();
        self.clients[self.position].as_ref()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl fmt::Debug for ClientRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRing")
            .field(
                "clients",
                &self.clients.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("position", &self.position)
            .finish()
    }
}

/// Builds the private ring of clients of a worker. Each worker gets its own
/// client to each usable node, which allows for some concurrency while still
/// bounding it.
pub fn build_client_ring(
    worker: usize,
    testnet: &Testnet,
    connector: &dyn Connector,
    observer: &dyn LoadObserver,
) -> Result<ClientRing, LoadError> {
    let clients = testnet
        .nodes
        .iter()
        // Don't send load through seed nodes because they do not provide the
        // RPC endpoints required to broadcast transactions.
        .filter(|node| node.mode.accepts_transactions())
        .filter_map(|node| match connector.connect(node) {
            Ok(client) => Some(client),
            Err(error) => {
                observer.endpoint_excluded(worker, node, &error);
                None
            },
        })
        .collect();

    ClientRing::new(clients).ok_or(LoadError::NoUsableEndpoints { worker })
}
