// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{fs, path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error accessing {0}: {1}")]
    IO(String, #[source] std::io::Error),
    #[error("Error (de)serializing {0}: {1}")]
    Yaml(String, #[source] serde_yaml::Error),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

pub trait PersistableConfig: Serialize + DeserializeOwned {
    /// Load the config from disk at the given path
    fn load_config<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_string = path.as_ref().display().to_string();
        let contents =
            fs::read_to_string(&path).map_err(|error| ConfigError::IO(path_string.clone(), error))?;
        serde_yaml::from_str(&contents).map_err(|error| ConfigError::Yaml(path_string, error))
    }

    /// Save the config to disk at the given output path
    fn save_config<P: AsRef<Path>>(&self, output_file: P) -> Result<(), ConfigError> {
        let path_string = output_file.as_ref().display().to_string();
        let serialized =
            serde_yaml::to_vec(&self).map_err(|error| ConfigError::Yaml(path_string.clone(), error))?;
        fs::write(&output_file, serialized).map_err(|error| ConfigError::IO(path_string, error))
    }

    /// Parse the config from the serialized string
    fn parse_serialized_config(serialized_config: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(serialized_config)
            .map_err(|error| ConfigError::Yaml("config".to_string(), error))
    }
}

/// Tunables of the load pipeline. The defaults are what e2e runs use.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    pub workers_per_node: usize, // Workers spawned for every node in the testnet
    pub max_workers: usize,      // Cap on workers, each holds a client to every usable node
    pub key_space: u64,          // Number of distinct keys the generated transactions write to

    pub base_jitter_min_ms: u64,
    pub base_jitter_max_ms: u64,
    pub per_byte_jitter_us: u64, // Upper bound of the size scaled wait, per payload byte

    pub rpc_timeout_ms: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            workers_per_node: 8,
            max_workers: 64,
            key_space: 100,

            base_jitter_min_ms: 10,
            base_jitter_max_ms: 100,
            per_byte_jitter_us: 1_000, // 1 ms

            rpc_timeout_ms: 10_000,
        }
    }
}

impl PersistableConfig for LoadConfig {}

impl LoadConfig {
    pub fn sanitize(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("workers_per_node", self.workers_per_node as u64),
            ("max_workers", self.max_workers as u64),
            ("key_space", self.key_space),
            ("base_jitter_min_ms", self.base_jitter_min_ms),
            ("rpc_timeout_ms", self.rpc_timeout_ms),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::InvariantViolation(format!(
                "{} must be greater than zero",
                name
            )));
        }
        if self.base_jitter_min_ms > self.base_jitter_max_ms {
            return Err(ConfigError::InvariantViolation(format!(
                "base_jitter_min_ms ({}) is larger than base_jitter_max_ms ({})",
                self.base_jitter_min_ms, self.base_jitter_max_ms
            )));
        }
        Ok(())
    }

    pub fn base_jitter(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.base_jitter_min_ms),
            Duration::from_millis(self.base_jitter_max_ms),
        )
    }

    pub fn per_byte_jitter(&self) -> Duration {
        Duration::from_micros(self.per_byte_jitter_us)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
