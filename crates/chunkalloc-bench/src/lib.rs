//! Workloads and utilities for benchmarking `chunkalloc`.
//!
//! - [`request_sizes`]: deterministic request sizes via a seed
//! - [`init_tracing`]: opt-in log output controlled by `RUST_LOG`

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Generate `count` deterministic request sizes in `1..=max`.
///
/// Uses a linear congruential step on the seed so runs are reproducible
/// without a random number generator.
pub fn request_sizes(count: usize, max: usize, seed: u64) -> Vec<usize> {
    assert!(max > 0, "max request size must be non-zero");
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) % max as u64) as usize + 1
        })
        .collect()
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
