//! src/generator/mod.rs
//!
//! This module implements the batch generators.
//!
//! A generator coordinates a `SampleSource`, an `IndexSequencer` and an
//! `AugmentationPipeline` to turn a (possibly lazily decoded) dataset into stacked,
//! standardized tensors with one-hot labels, one batch per call.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────┐
//!                  │ SampleSource │ (tensors or lazy handles + labels)
//!                  └──────┬───────┘
//!                         │ indexed access
//!                         ↓
//!                 ┌────────────────┐
//!                 │ IndexSequencer │ (epoch order, sliced into index batches)
//!                 └───────┬────────┘
//!                         │ one index batch per call (mutex-guarded cursor)
//!                         ↓
//!                  ┌──────────────┐
//!                  │  Assembler   │ ←───── GeneratorConfig (batch_size, seed, ...)
//!                  └──────┬───────┘
//!                         │ resolve + per-sample transform
//!                         ↓
//!         [calling thread]  or  [Worker Threads] (parallel assembler)
//!                         │
//!                         │ written by position
//!                         ↓
//!                  ┌──────────────┐
//!                  │ BatchBuffer  │ (shape fixed by the first sample)
//!                  └──────┬───────┘
//!                         │ standardize → extra aug → one-hot labels
//!                         ↓
//!                    ┌─────────┐
//!                    │  Batch  │ (input_n refs to one tensor + labels)
//!                    └─────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/generator/
//! ├── mod.rs             # BatchGenerator trait, build_generator, re-exports
//! ├── config.rs          # GeneratorConfig, builder, and validation
//! ├── sequencer.rs       # IndexSequencer and its epoch state machine
//! ├── batch.rs           # Batch, BatchBuffer, shared ShapeCache
//! ├── assembly.rs        # Logic shared by both assemblers
//! ├── sequential.rs      # BatchAssembler
//! ├── parallel.rs        # ParallelBatchAssembler
//! ├── iter.rs            # Endless BatchIter
//! ├── workers/
//! │   ├── mod.rs         # Task types
//! │   └── pool.rs        # Generic `WorkerPool<Task>`
//! └── common/
//!     ├── mod.rs
//!     └── thread.rs      # Thread-local worker ID, per-task RNG derivation
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! let source = ImageFolderSource::open("./data/patches", DEFAULT_EXTENSIONS)?;
//! let config = GeneratorConfig::builder()
//!     .batch_size(32)
//!     .nclasses(source.nclasses())
//!     .target_size(240, 240)
//!     .build()?;
//! let pipeline = AugmentationPipeline::new(AugmentationConfig::default(), None)?;
//!
//! let generator = build_generator(Arc::new(source), config, pipeline, true)?;
//! for batch in generator.iter().take(generator.batches_per_epoch()) {
//!     let batch = batch?;
//!     // feed batch.inputs / batch.labels to the model
//! }
//! ```
//!
//! # Determinism
//!
//! For a fixed seed, every batch is a pure function of its epoch and indices. The
//! sequential and parallel assemblers therefore return identical tensors, random
//! augmentation included.

mod assembly;
mod batch;
mod common;
mod config;
mod iter;
mod parallel;
mod sequencer;
mod sequential;
mod workers;

pub use batch::Batch;
pub use common::thread::{current_worker_id, derive_batch_rng, derive_sample_rng, WORKER_ID};
pub use config::{GeneratorConfig, GeneratorConfigBuilder};
pub use iter::BatchIter;
pub use parallel::ParallelBatchAssembler;
pub use sequencer::{EpochState, IndexBatch, IndexSequencer};
pub use sequential::BatchAssembler;

use crate::dataset::SampleSource;
use crate::sample::SampleHandle;
use crate::transforms::AugmentationPipeline;
use anyhow::Result;
use std::sync::Arc;

/// Pull-based batch production, shared by the sequential and parallel assemblers.
///
/// All methods take `&self`: a generator can be shared between threads, each call to
/// `next_batch` receiving a distinct index batch.
pub trait BatchGenerator: Send + Sync {
    /// The next batch of the current epoch, starting a new epoch when needed.
    fn next_batch(&self) -> Result<Batch>;

    /// The batch of dataset-order indices `offset..offset + batch_size`. Does not
    /// advance the epoch cursor.
    fn batch_at(&self, offset: usize) -> Result<Batch>;

    /// Number of samples `N` in the dataset.
    fn sample_count(&self) -> usize;

    /// All samples and labels, unmodified.
    fn raw_data(&self) -> (Vec<SampleHandle>, Vec<usize>);

    /// Labels of the given indices, or all labels when `None`.
    fn labels_at(&self, indices: Option<&[usize]>) -> Result<Vec<usize>>;

    fn batches_per_epoch(&self) -> usize;

    /// The epoch currently in progress (0-based).
    fn epoch(&self) -> Result<usize>;

    fn iter(&self) -> BatchIter<'_>
    where
        Self: Sized,
    {
        BatchIter::new(self)
    }
}

impl<G: BatchGenerator + ?Sized> BatchGenerator for Box<G> {
    fn next_batch(&self) -> Result<Batch> {
        (**self).next_batch()
    }

    fn batch_at(&self, offset: usize) -> Result<Batch> {
        (**self).batch_at(offset)
    }

    fn sample_count(&self) -> usize {
        (**self).sample_count()
    }

    fn raw_data(&self) -> (Vec<SampleHandle>, Vec<usize>) {
        (**self).raw_data()
    }

    fn labels_at(&self, indices: Option<&[usize]>) -> Result<Vec<usize>> {
        (**self).labels_at(indices)
    }

    fn batches_per_epoch(&self) -> usize {
        (**self).batches_per_epoch()
    }

    fn epoch(&self) -> Result<usize> {
        (**self).epoch()
    }
}

/// Builds a sequential (`threaded = false`) or parallel generator behind one type.
pub fn build_generator(
    source: Arc<dyn SampleSource>,
    config: GeneratorConfig,
    pipeline: AugmentationPipeline,
    threaded: bool,
) -> Result<Box<dyn BatchGenerator>> {
    let verbose = config.verbose;
    let pipeline = Arc::new(pipeline);
    let generator: Box<dyn BatchGenerator> = if threaded {
        Box::new(ParallelBatchAssembler::from_shared(source, config, pipeline)?)
    } else {
        Box::new(BatchAssembler::from_shared(source, config, pipeline)?)
    };
    if verbose > 0 {
        tracing::info!(
            threaded,
            samples = generator.sample_count(),
            batches_per_epoch = generator.batches_per_epoch(),
            "batch generator ready"
        );
    }
    Ok(generator)
}
