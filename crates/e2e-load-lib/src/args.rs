// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    config::{ConfigError, LoadConfig, PersistableConfig},
    testnet::Testnet,
};
use clap::Parser;
use std::{path::PathBuf, time::Duration};
use url::Url;

const DEFAULT_TX_SIZE: usize = 1024;

#[derive(Clone, Debug, Parser)]
pub struct TestnetArgs {
    #[clap(
        long,
        conflicts_with = "targets",
        required_unless_present = "targets",
        help = "YAML manifest describing the nodes of the testnet"
    )]
    pub manifest: Option<PathBuf>,

    #[clap(
        long = "target",
        help = "RPC URL of a node to send load to, the node is assumed to be a validator"
    )]
    pub targets: Vec<Url>,

    #[clap(
        long,
        help = "Size in bytes of the random payload, overrides the one of the manifest"
    )]
    pub tx_size: Option<usize>,

    #[clap(long, default_value = "e2e", help = "Name of a testnet given by targets")]
    pub name: String,
}

impl TestnetArgs {
    pub fn to_testnet(&self) -> Result<Testnet, ConfigError> {
        let mut testnet = match &self.manifest {
            Some(manifest) => Testnet::load_config(manifest)?,
            None => Testnet::from_targets(
                self.name.clone(),
                &self.targets,
                self.tx_size.unwrap_or(DEFAULT_TX_SIZE),
            )?,
        };
        if let Some(tx_size) = self.tx_size {
            testnet.tx_size = tx_size;
        }
        testnet.sanitize()?;
        Ok(testnet)
    }
}

#[derive(Clone, Debug, Parser)]
pub struct LoadArgs {
    #[clap(long, default_value_t = 0, help = "How long to run, 0 runs until interrupted")]
    pub duration_secs: u64,

    #[clap(long, help = "YAML file overriding the load tunables")]
    pub config: Option<PathBuf>,
}

impl LoadArgs {
    pub fn duration(&self) -> Option<Duration> {
        match self.duration_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn load_config(&self) -> Result<LoadConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => LoadConfig::load_config(path)?,
            None => LoadConfig::default(),
        };
        config.sanitize()?;
        Ok(config)
    }
}
