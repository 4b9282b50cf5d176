//! Thread-local worker identification and per-task RNG derivation.
//!
//! Random augmentation never draws from shared or thread-local generator state.
//! Every sample (and every batch) gets its own `StdRng` derived from the generator
//! seed, so the same index batch produces the same tensors no matter which thread
//! ran which task, or in what order.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;

thread_local! {
    /// Thread-local worker ID.
    ///
    /// Each worker thread is assigned a unique ID (0 to num_workers-1) when spawned.
    /// Only used to tag log events and error messages; it never influences results.
    pub static WORKER_ID: RefCell<usize> = const { RefCell::new(0) };
}

/// ID of the worker running on the current thread (0 outside the pool).
pub fn current_worker_id() -> usize {
    WORKER_ID.with(|id| *id.borrow())
}

/// RNG for the per-sample transform of dataset entry `index` during `epoch`.
///
/// Seed formula: `seed + (epoch << 32) + index`
pub fn derive_sample_rng(seed: u64, epoch: usize, index: usize) -> StdRng {
    let derived = seed
        .wrapping_add((epoch as u64) << 32)
        .wrapping_add(index as u64);
    StdRng::seed_from_u64(derived)
}

/// RNG for the whole-batch augmentation of the batch made of `indices` during `epoch`.
///
/// The indices are folded in order, so the same indices in a different order give
/// a different stream.
pub fn derive_batch_rng(seed: u64, epoch: usize, indices: &[usize]) -> StdRng {
    let mut state = seed ^ ((epoch as u64) << 32) ^ 0x9E37_79B9_7F4A_7C15;
    for &index in indices {
        state = splitmix64(state ^ index as u64);
    }
    StdRng::seed_from_u64(state)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
