//! Worker management for parallel batch assembly.
//!
//! - `pool`: generic worker pool over a shared task queue
//!
//! The task type below is what the parallel assembler sends through the pool: one
//! task per sample, each carrying the reply channel of the batch it belongs to.

pub(crate) mod pool;

use anyhow::Result;
use crossbeam_channel::Sender;
use ndarray::ArrayD;

/// How often idle workers check the shutdown flag (milliseconds).
pub(crate) const WORKER_POLL_MS: u64 = 100;

/// Decode and transform one dataset entry.
#[derive(Debug)]
pub(crate) struct DecodeTask {
    /// Position of the sample inside its batch.
    pub(crate) position: usize,
    /// Dataset index of the sample.
    pub(crate) index: usize,
    /// Epoch the batch belongs to, for RNG derivation.
    pub(crate) epoch: usize,
    pub(crate) reply: Sender<DecodeOutput>,
}

/// A finished task, returned on the batch's reply channel.
#[derive(Debug)]
pub(crate) struct DecodeOutput {
    pub(crate) position: usize,
    pub(crate) sample: Result<ArrayD<f32>>,
}
