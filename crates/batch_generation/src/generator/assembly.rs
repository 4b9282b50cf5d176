//! src/generator/assembly.rs
//!
//! Logic shared by the sequential and parallel assemblers.
//!
//! Both assemblers follow the same three phases and differ only in where the middle
//! one runs:
//!
//! 1. `next_indices`: advance the sequencer (the only locked region)
//! 2. `SampleLoader::load` per index: resolve + per-sample transform
//! 3. `finish`: standardize, extra augmentation, one-hot labels, `input_n` fan-out
//!
//! Every random draw in phases 2 and 3 comes from an RNG derived from the seed and
//! the batch's (epoch, index) coordinates, so the two assemblers agree bit for bit.

use super::batch::{Batch, BatchBuffer, ShapeCache};
use super::common::thread::{derive_batch_rng, derive_sample_rng};
use super::config::GeneratorConfig;
use super::sequencer::{IndexBatch, IndexSequencer};
use crate::dataset::SampleSource;
use crate::encoder::CategoricalEncoder;
use crate::error::PipelineError;
use crate::sample::SampleHandle;
use crate::transforms::AugmentationPipeline;
use anyhow::{ensure, Context, Result};
use ndarray::ArrayD;
use std::sync::Arc;

/// Resolves and transforms single samples. Cheap to clone into worker threads.
#[derive(Clone)]
pub(crate) struct SampleLoader {
    source: Arc<dyn SampleSource>,
    pipeline: Arc<AugmentationPipeline>,
    config: Arc<GeneratorConfig>,
}

impl SampleLoader {
    /// Decodes entry `index` and applies the per-sample transform with the RNG
    /// derived from `(seed, epoch, index)`.
    pub(crate) fn load(&self, index: usize, epoch: usize) -> Result<ArrayD<f32>> {
        let (handle, _) = self.source.get(index)?;
        let sample = handle
            .resolve(self.config.target_size, self.config.verbose)
            .map_err(|source| {
                tracing::warn!(index, error = %source, "failed to decode sample");
                PipelineError::Decode { index, source }
            })?;
        let mut rng = derive_sample_rng(self.config.seed, epoch, index);
        self.pipeline
            .transform_sample(sample, &mut rng)
            .with_context(|| format!("Failed to transform sample {}", index))
    }
}

/// Dataset, configuration, scheduler and shape state of one generator.
pub(crate) struct BatchCore {
    loader: SampleLoader,
    sequencer: IndexSequencer,
    shapes: ShapeCache,
}

impl BatchCore {
    pub(crate) fn new(
        source: Arc<dyn SampleSource>,
        config: GeneratorConfig,
        pipeline: Arc<AugmentationPipeline>,
    ) -> Result<Self> {
        config.validate()?;
        ensure!(
            !source.is_empty(),
            PipelineError::config("cannot generate batches from an empty dataset")
        );
        let sequencer =
            IndexSequencer::new(source.len(), config.batch_size, config.shuffle, config.seed)?;
        Ok(Self {
            loader: SampleLoader {
                source,
                pipeline,
                config: Arc::new(config),
            },
            sequencer,
            shapes: ShapeCache::default(),
        })
    }

    pub(crate) fn config(&self) -> &GeneratorConfig {
        &self.loader.config
    }

    pub(crate) fn loader(&self) -> &SampleLoader {
        &self.loader
    }

    pub(crate) fn source(&self) -> &dyn SampleSource {
        self.loader.source.as_ref()
    }

    pub(crate) fn sequencer(&self) -> &IndexSequencer {
        &self.sequencer
    }

    /// Phase 1 for `next_batch`.
    pub(crate) fn next_indices(&self) -> Result<IndexBatch> {
        let batch = self.sequencer.next_batch_indices()?;
        if self.config().verbose > 1 {
            tracing::debug!(epoch = batch.epoch, indices = ?batch.indices, "index batch");
        }
        Ok(batch)
    }

    /// Phase 1 for `batch_at`: dataset-order indices `offset..offset + batch_size`,
    /// clamped to the dataset end, tagged with the current epoch.
    pub(crate) fn replay_indices(&self, offset: usize) -> Result<IndexBatch> {
        let len = self.source().len();
        ensure!(offset < len, PipelineError::IndexOutOfRange { offset, len });
        let end = offset.saturating_add(self.config().batch_size).min(len);
        Ok(IndexBatch {
            epoch: self.sequencer.epoch()?,
            indices: (offset..end).collect(),
        })
    }

    /// An empty buffer for `len` samples. The shape is shared across batches unless
    /// `variable_shape` is set.
    pub(crate) fn buffer(&self, len: usize) -> Result<BatchBuffer<'_>> {
        let cache = (!self.config().variable_shape).then_some(&self.shapes);
        BatchBuffer::new(len, cache)
    }

    /// Phase 3: whole-batch steps on a fully written buffer.
    pub(crate) fn finish(&self, buffer: BatchBuffer<'_>, batch: IndexBatch) -> Result<Batch> {
        let config = self.config();
        let labels = batch
            .indices
            .iter()
            .map(|&index| self.source().get(index).map(|(_, label)| label))
            .collect::<Result<Vec<_>>>()?;
        let labels = CategoricalEncoder::encode_batch(&labels, config.nclasses)?;

        let tensor = buffer.into_tensor()?;
        let mut rng = derive_batch_rng(config.seed, batch.epoch, &batch.indices);
        let tensor = self
            .loader
            .pipeline
            .finalize_batch(tensor, &mut rng, config.extra_aug)
            .context("Failed to standardize batch")?;

        let tensor = Arc::new(tensor);
        Ok(Batch {
            inputs: vec![tensor; config.input_n],
            labels,
            indices: batch.indices,
            epoch: batch.epoch,
        })
    }

    pub(crate) fn labels_at(&self, indices: Option<&[usize]>) -> Result<Vec<usize>> {
        let labels = self.source().labels();
        match indices {
            None => Ok(labels.to_vec()),
            Some(indices) => indices
                .iter()
                .map(|&offset| {
                    labels.get(offset).copied().ok_or_else(|| {
                        anyhow::Error::from(PipelineError::IndexOutOfRange {
                            offset,
                            len: labels.len(),
                        })
                    })
                })
                .collect(),
        }
    }

    pub(crate) fn raw_data(&self) -> (Vec<SampleHandle>, Vec<usize>) {
        self.source().raw_data()
    }
}
