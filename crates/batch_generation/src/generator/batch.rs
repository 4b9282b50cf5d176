//! src/generator/batch.rs
//!
//! The assembled `Batch` and the buffer it is stacked into.

use crate::error::PipelineError;
use anyhow::{anyhow, ensure, Context, Result};
use ndarray::{Array2, ArrayD, Axis, IxDyn};
use std::sync::{Arc, Mutex};

/// A stacked, standardized batch and its one-hot labels.
///
/// `inputs` holds `input_n` references to the *same* tensor: ensemble sub-models all
/// read identical data, and no copy is made per input.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `input_n` handles to one `[k, ...sample_shape]` tensor
    pub inputs: Vec<Arc<ArrayD<f32>>>,
    /// `[k, nclasses]` one-hot rows, in the order of `indices`
    pub labels: Array2<f32>,
    /// Dataset indices of the `k` samples
    pub indices: Vec<usize>,
    pub epoch: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The batch tensor.
    pub fn input(&self) -> &ArrayD<f32> {
        &self.inputs[0]
    }

    /// Shape of a single sample (the batch tensor without its leading axis).
    pub fn sample_shape(&self) -> &[usize] {
        &self.input().shape()[1..]
    }
}

// ============================================================================
// ShapeCache
// ============================================================================

/// The sample shape discovered from the first resolved sample.
///
/// Shared by every batch of a generator (and by concurrent `next_batch` callers), so
/// the first-allocation decision is taken under a lock: whoever gets there first fixes
/// the shape, everyone else reads it.
#[derive(Debug, Default)]
pub(crate) struct ShapeCache {
    shape: Mutex<Option<Vec<usize>>>,
}

impl ShapeCache {
    pub(crate) fn get(&self) -> Result<Option<Vec<usize>>> {
        Ok(self
            .shape
            .lock()
            .map_err(|_| anyhow!("Shape cache lock poisoned"))?
            .clone())
    }

    /// Returns the established shape, establishing `candidate` if none is set yet.
    pub(crate) fn establish(&self, candidate: &[usize]) -> Result<Vec<usize>> {
        let mut shape = self
            .shape
            .lock()
            .map_err(|_| anyhow!("Shape cache lock poisoned"))?;
        Ok(shape.get_or_insert_with(|| candidate.to_vec()).clone())
    }
}

// ============================================================================
// BatchBuffer
// ============================================================================

/// Pre-allocated `[k, ...shape]` storage, filled by position.
///
/// Allocation is lazy: the buffer takes its shape from the first sample written into
/// it (or from the shared cache, when one is given and already set). Every later
/// sample must match that shape exactly.
pub(crate) struct BatchBuffer<'a> {
    len: usize,
    cache: Option<&'a ShapeCache>,
    data: Option<ArrayD<f32>>,
    filled: Vec<bool>,
}

impl<'a> BatchBuffer<'a> {
    /// `cache = None` makes the shape local to this batch (variable-shape mode).
    pub(crate) fn new(len: usize, cache: Option<&'a ShapeCache>) -> Result<Self> {
        let mut buffer = Self {
            len,
            cache,
            data: None,
            filled: vec![false; len],
        };
        if let Some(shape) = cache.map(ShapeCache::get).transpose()?.flatten() {
            buffer.allocate(&shape);
        }
        Ok(buffer)
    }

    fn allocate(&mut self, sample_shape: &[usize]) {
        let mut shape = Vec::with_capacity(sample_shape.len() + 1);
        shape.push(self.len);
        shape.extend_from_slice(sample_shape);
        self.data = Some(ArrayD::zeros(IxDyn(&shape)));
    }

    /// Writes `sample` at batch `position`.
    pub(crate) fn insert(&mut self, position: usize, sample: ArrayD<f32>) -> Result<()> {
        ensure!(
            position < self.len,
            "Batch position {} out of range for a batch of {}",
            position,
            self.len
        );
        if self.data.is_none() {
            let shape = match self.cache {
                Some(cache) => cache.establish(sample.shape())?,
                None => sample.shape().to_vec(),
            };
            self.allocate(&shape);
        }
        let data = self
            .data
            .as_mut()
            .context("Batch buffer was not allocated")?;

        let expected = &data.shape()[1..];
        ensure!(
            sample.shape() == expected,
            PipelineError::ShapeMismatch {
                position,
                expected: expected.to_vec(),
                found: sample.shape().to_vec(),
            }
        );
        data.index_axis_mut(Axis(0), position).assign(&sample);
        self.filled[position] = true;
        Ok(())
    }

    /// The stacked tensor. Fails if any position was never written.
    pub(crate) fn into_tensor(self) -> Result<ArrayD<f32>> {
        if let Some(missing) = self.filled.iter().position(|&f| !f) {
            return Err(anyhow!("Batch position {} was never filled", missing));
        }
        self.data.context("Cannot stack an empty batch")
    }
}
