use anyhow::Result;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Spatial size `(width, height)` a lazily decoded sample is resized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A dataset entry whose tensor is only produced on demand.
///
/// `decode` is called freshly every time the sample is referenced by a batch, from any
/// worker thread, so implementations must be reentrant and must not cache the result.
pub trait LazySample: Debug + Send + Sync {
    /// Reads the backing resource and returns the sample tensor.
    /// Fails when the resource is unreadable or corrupt.
    fn decode(&self, target_size: Option<TargetSize>, verbose: u8) -> Result<ArrayD<f32>>;
}

/// The `SampleHandle` represents a single dataset entry.
///
/// It is either:
/// - **Tensor**: an already materialized array, shared with `Arc` so cloning a
///   dataset never copies pixel data.
/// - **Lazy**: a reference to a resource (e.g. an image file) that must be decoded.
///
/// Both are consumed through [`resolve`](Self::resolve).
#[derive(Debug, Clone)]
pub enum SampleHandle {
    Tensor(Arc<ArrayD<f32>>),
    Lazy(Arc<dyn LazySample>),
}

impl SampleHandle {
    /// Wraps an in-memory array.
    pub fn tensor(array: ArrayD<f32>) -> Self {
        Self::Tensor(Arc::new(array))
    }

    /// Wraps a lazily decoded resource.
    pub fn lazy(sample: impl LazySample + 'static) -> Self {
        Self::Lazy(Arc::new(sample))
    }

    /// Returns an owned tensor for this entry, decoding it if needed.
    pub fn resolve(&self, target_size: Option<TargetSize>, verbose: u8) -> Result<ArrayD<f32>> {
        match self {
            Self::Tensor(array) => Ok(array.as_ref().clone()),
            Self::Lazy(sample) => sample.decode(target_size, verbose),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }
}
