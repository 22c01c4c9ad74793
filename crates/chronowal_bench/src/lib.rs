//! Benchmark utilities for chronowal.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chronowal_core::{Wal, WalConfig, WalResult, PAGE_SIZE};
use rand::Rng;
use std::path::Path;

/// Segment size used by the benchmarks: small enough to exercise rollover.
pub const BENCH_SEGMENT_SIZE: usize = 256 * PAGE_SIZE;

/// Generates random record data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generates a batch of `count` random records of `size` bytes each.
pub fn random_batch(count: usize, size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(size)).collect()
}

/// Opens a WAL in `dir` with the benchmark segment size.
pub fn open_wal(dir: &Path) -> WalResult<Wal> {
    let config = WalConfig::new().segment_size(BENCH_SEGMENT_SIZE);
    Wal::open_with_config(dir, config)
}

/// Writes `records` records of `size` bytes into a fresh WAL in `dir`.
pub fn fill_wal(dir: &Path, records: usize, size: usize) -> WalResult<()> {
    let wal = open_wal(dir)?;
    for batch in random_batch(records, size).chunks(64) {
        wal.log(batch)?;
    }
    wal.close()
}
