//! src/generator/sequential.rs
//!
//! Single-threaded batch assembly.

use super::assembly::BatchCore;
use super::batch::Batch;
use super::config::GeneratorConfig;
use super::sequencer::IndexBatch;
use super::BatchGenerator;
use crate::dataset::SampleSource;
use crate::sample::SampleHandle;
use crate::transforms::AugmentationPipeline;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Resolves, transforms and stacks every sample of a batch on the calling thread.
///
/// # Example
/// ```ignore
/// let config = GeneratorConfig::builder().batch_size(16).nclasses(2).build()?;
/// let generator = BatchAssembler::new(source, config, AugmentationPipeline::passthrough())?;
/// let batch = generator.next_batch()?;
/// assert_eq!(batch.labels.ncols(), 2);
/// ```
pub struct BatchAssembler {
    core: BatchCore,
}

impl BatchAssembler {
    pub fn new(
        source: impl SampleSource + 'static,
        config: GeneratorConfig,
        pipeline: AugmentationPipeline,
    ) -> Result<Self> {
        Self::from_shared(Arc::new(source), config, Arc::new(pipeline))
    }

    /// Builds an assembler over a source and pipeline already shared with others.
    pub fn from_shared(
        source: Arc<dyn SampleSource>,
        config: GeneratorConfig,
        pipeline: Arc<AugmentationPipeline>,
    ) -> Result<Self> {
        Ok(Self {
            core: BatchCore::new(source, config, pipeline)?,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        self.core.config()
    }

    /// Assembles the batch for an explicit index batch, without touching the
    /// sequencer. Output order follows `batch.indices`.
    pub fn assemble(&self, batch: IndexBatch) -> Result<Batch> {
        let loader = self.core.loader();
        let mut buffer = self.core.buffer(batch.len())?;
        for (position, &index) in batch.indices.iter().enumerate() {
            let sample = loader.load(index, batch.epoch)?;
            buffer
                .insert(position, sample)
                .with_context(|| format!("Failed to stack sample {}", index))?;
        }
        self.core.finish(buffer, batch)
    }
}

impl BatchGenerator for BatchAssembler {
    fn next_batch(&self) -> Result<Batch> {
        let indices = self.core.next_indices()?;
        self.assemble(indices)
    }

    fn batch_at(&self, offset: usize) -> Result<Batch> {
        let indices = self.core.replay_indices(offset)?;
        self.assemble(indices)
    }

    fn sample_count(&self) -> usize {
        self.core.source().len()
    }

    fn raw_data(&self) -> (Vec<SampleHandle>, Vec<usize>) {
        self.core.raw_data()
    }

    fn labels_at(&self, indices: Option<&[usize]>) -> Result<Vec<usize>> {
        self.core.labels_at(indices)
    }

    fn batches_per_epoch(&self) -> usize {
        self.core.sequencer().batches_per_epoch()
    }

    fn epoch(&self) -> Result<usize> {
        self.core.sequencer().epoch()
    }
}
