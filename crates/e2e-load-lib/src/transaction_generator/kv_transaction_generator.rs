// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    config::LoadConfig,
    error::LoadError,
    transaction_generator::{Transaction, TransactionGenerator},
};
use rand::{Rng, rngs::StdRng};
use rand_core::{OsRng, RngCore, SeedableRng};
use std::time::Duration;

/// Generates `load-{key}={value}` transactions for a key-value application.
///
/// We keep generating the same few keys over and over, with different
/// values. This gives a reasonable load without putting too much data in
/// the app.
pub struct KvTransactionGenerator {
    rng: StdRng,
    tx_size: usize,
    config: LoadConfig,
}

impl KvTransactionGenerator {
    pub fn new(tx_size: usize, config: LoadConfig) -> Result<Self, LoadError> {
        let rng = StdRng::from_rng(OsRng)?;
        Ok(Self::with_rng(rng, tx_size, config))
    }

    pub fn with_rng(rng: StdRng, tx_size: usize, config: LoadConfig) -> Self {
        Self {
            rng,
            tx_size,
            config,
        }
    }
}

impl TransactionGenerator for KvTransactionGenerator {
    fn generate_transaction(&mut self) -> Result<Transaction, LoadError> {
        let id = self.rng.gen_range(0, self.config.key_space);
        let mut bz = vec![0u8; self.tx_size];
        self.rng.try_fill_bytes(&mut bz)?;
        Ok(Transaction::new(format!("load-{:X}={}", id, hex::encode(bz))))
    }

    fn wait_time(&mut self) -> Duration {
        load_generate_wait_time(&mut self.rng, self.tx_size, &self.config)
    }
}

/// Randomized pause between two transactions: a base jitter plus a jitter
/// scaled with the payload size, so that the load roughly follows the
/// available bandwidth without settling into a fixed cadence.
pub fn load_generate_wait_time<R: Rng>(
    rng: &mut R,
    size: usize,
    config: &LoadConfig,
) -> Duration {
    let (min, max) = config.base_jitter();
    let base_jitter = rng.gen_range(as_nanos(min), as_nanos(max).saturating_add(1));

    let size_factor = as_nanos(config.per_byte_jitter()).saturating_mul(size as u64);
    let size_jitter = rng.gen_range(0, size_factor.saturating_add(1));

    scale_wait_time(
        size,
        Duration::from_nanos(base_jitter),
        Duration::from_nanos(size_jitter),
    )
}

/// Single byte transactions are waited on half as long.
pub(crate) fn scale_wait_time(size: usize, base_jitter: Duration, size_jitter: Duration) -> Duration {
    let wait_time = base_jitter + size_jitter;
    if size == 1 {
        return wait_time / 2;
    }
    wait_time
}

fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng(seed: u8) -> StdRng {
        StdRng::from_seed([seed; 32])
    }

    #[test]
    fn test_wait_time_is_bounded() {
        let config = LoadConfig::default();
        let mut rng = rng(7);
        for size in [1, 2, 10, 100, 1024, 65536] {
            let upper = Duration::from_millis(100) + Duration::from_millis(size as u64);
            for _ in 0..200 {
                let wait = load_generate_wait_time(&mut rng, size, &config);
                assert!(wait > Duration::ZERO, "size {} waited {:?}", size, wait);
                assert!(wait <= upper, "size {} waited {:?} > {:?}", size, wait, upper);
            }
        }
    }

    #[test]
    fn test_wait_time_respects_base_jitter_floor() {
        let config = LoadConfig::default();
        let mut rng = rng(3);
        for _ in 0..200 {
            assert!(load_generate_wait_time(&mut rng, 512, &config) >= Duration::from_millis(10));
            assert!(load_generate_wait_time(&mut rng, 1, &config) >= Duration::from_millis(5));
        }
    }

    #[test]
    fn test_single_byte_wait_is_halved() {
        let base_jitter = Duration::from_millis(42);
        let size_jitter = Duration::from_micros(800);
        let unhalved = scale_wait_time(2, base_jitter, size_jitter);
        assert_eq!(unhalved, base_jitter + size_jitter);
        assert_eq!(scale_wait_time(1, base_jitter, size_jitter), unhalved / 2);
    }

    #[test]
    fn test_single_byte_wait_uses_same_draws() {
        let config = LoadConfig::default();
        let (mut left, mut right) = (rng(11), rng(11));
        for _ in 0..100 {
            let halved = load_generate_wait_time(&mut left, 1, &config);

            let (min, max) = config.base_jitter();
            let base_jitter = right.gen_range(as_nanos(min), as_nanos(max) + 1);
            let size_jitter = right.gen_range(0, as_nanos(config.per_byte_jitter()) + 1);
            let unhalved = Duration::from_nanos(base_jitter + size_jitter);
            assert_eq!(halved, unhalved / 2);
        }
    }

    #[test]
    fn test_transactions_reuse_small_key_space() {
        let config = LoadConfig {
            key_space: 4,
            ..Default::default()
        };
        let mut generator = KvTransactionGenerator::with_rng(rng(1), 16, config);
        for _ in 0..100 {
            let txn = generator.generate_transaction().unwrap();
            let encoded = std::str::from_utf8(txn.as_bytes()).unwrap();
            let (key, value) = encoded.split_once('=').unwrap();
            let id = u64::from_str_radix(key.strip_prefix("load-").unwrap(), 16).unwrap();
            assert!(id < 4);
            assert_eq!(value.len(), 32);
            assert!(hex::decode(value).is_ok());
        }
    }

    #[test]
    fn test_key_id_is_uppercase_hex() {
        let config = LoadConfig {
            key_space: 16,
            ..Default::default()
        };
        let mut generator = KvTransactionGenerator::with_rng(rng(5), 1, config);
        let keys: Vec<_> = (0..500)
            .map(|_| {
                let txn = generator.generate_transaction().unwrap();
                String::from_utf8(txn.as_bytes().to_vec()).unwrap()
            })
            .collect();
        assert!(keys.iter().any(|k| k.starts_with("load-F=")));
        assert!(keys.iter().all(|k| !k.starts_with("load-f=")));
    }
}
