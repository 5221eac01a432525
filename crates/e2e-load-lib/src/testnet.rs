// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::config::{ConfigError, PersistableConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Port the node RPC listens on when the target URL does not name one.
pub const DEFAULT_RPC_PORT: u16 = 26657;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Validator,
    Full,
    Light,
    Seed,
}

impl Mode {
    /// Seed nodes only do peer exchange, they don't serve the transaction RPCs.
    pub fn accepts_transactions(self) -> bool {
        self != Mode::Seed
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            Mode::Validator => "validator",
            Mode::Full => "full",
            Mode::Light => "light",
            Mode::Seed => "seed",
        };
        write!(f, "{}", mode)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Node {
    pub name: String,
    pub mode: Mode,
    pub rpc_address: Url,
}

impl Node {
    pub fn new(name: impl Into<String>, mode: Mode, rpc_address: Url) -> Self {
        Self {
            name: name.into(),
            mode,
            rpc_address,
        }
    }
}

/// A running testnet, as far as the load generator is concerned.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Testnet {
    pub name: String,
    /// Size in bytes of the random payload of every transaction.
    pub tx_size: usize,
    pub nodes: Vec<Node>,
}

impl PersistableConfig for Testnet {}

impl Testnet {
    /// Builds a testnet of validators out of bare RPC URLs. We assume that
    /// every target serves the transaction RPCs.
    pub fn from_targets(
        name: impl Into<String>,
        targets: &[Url],
        tx_size: usize,
    ) -> Result<Self, ConfigError> {
        let mut nodes = Vec::with_capacity(targets.len());
        for (idx, target) in targets.iter().enumerate() {
            let host = target.host_str().ok_or_else(|| {
                ConfigError::InvariantViolation(format!("No host found in URL: {}", target))
            })?;
            let mut url = target.clone();
            if target.port().is_none() {
                url.set_port(Some(DEFAULT_RPC_PORT)).map_err(|_| {
                    ConfigError::InvariantViolation(format!("Failed to set port on URL: {}", target))
                })?;
            }
            nodes.push(Node::new(format!("{}-{}", host, idx), Mode::Validator, url));
        }
        let testnet = Self {
            name: name.into(),
            tx_size,
            nodes,
        };
        testnet.sanitize()?;
        Ok(testnet)
    }

    pub fn sanitize(&self) -> Result<(), ConfigError> {
        if self.tx_size == 0 {
            return Err(ConfigError::InvariantViolation(format!(
                "testnet {} must use transactions of at least one byte",
                self.name
            )));
        }
        if self.nodes.is_empty() {
            return Err(ConfigError::InvariantViolation(format!(
                "testnet {} has no nodes",
                self.name
            )));
        }
        Ok(())
    }
}
