use crate::error::PipelineError;
use crate::sample::SampleHandle;
use anyhow::{ensure, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A `SampleSource` provides indexed access to `(sample, label)` pairs.
///
/// The number of entries is fixed for the lifetime of any generator built on top of
/// it. Implementations must be `Send + Sync` because worker threads resolve samples
/// from the same source concurrently.
pub trait SampleSource: Send + Sync {
    /// Total number of entries.
    fn len(&self) -> usize;

    /// Random-access lookup by index. Fails with `IndexOutOfRange` past the end.
    fn get(&self, index: usize) -> Result<(&SampleHandle, usize)>;

    /// All labels in dataset order.
    fn labels(&self) -> &[usize];

    /// All samples and labels, unmodified.
    fn raw_data(&self) -> (Vec<SampleHandle>, Vec<usize>);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A source that keeps every handle in contiguous memory behind `Arc<[_]>`.
///
/// This enables:
/// - Zero-copy clone: cloning only bumps the `Arc` counters
/// - Thread-safe sharing: concurrent read access from worker threads
///
/// Handles may still be lazy; only the handles, not the decoded pixels, live here.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    samples: Arc<[SampleHandle]>,
    labels: Arc<[usize]>,
    metadata: HashMap<String, String>,
}

impl InMemorySource {
    /// Creates a source from parallel vectors of samples and labels.
    pub fn new(samples: Vec<SampleHandle>, labels: Vec<usize>) -> Result<Self> {
        ensure!(
            samples.len() == labels.len(),
            PipelineError::config(format!(
                "{} samples but {} labels were supplied",
                samples.len(),
                labels.len()
            ))
        );
        Ok(Self {
            samples: samples.into(),
            labels: labels.into(),
            metadata: HashMap::new(),
        })
    }

    /// Adds/updates metadata and returns the modified source.
    /// Enables chaining: `source.with_metadata("name", "MNIST")`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the value of a metadata field, if it exists.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }
}

impl SampleSource for InMemorySource {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<(&SampleHandle, usize)> {
        let sample = self.samples.get(index).ok_or(PipelineError::IndexOutOfRange {
            offset: index,
            len: self.samples.len(),
        })?;
        Ok((sample, self.labels[index]))
    }

    fn labels(&self) -> &[usize] {
        &self.labels
    }

    fn raw_data(&self) -> (Vec<SampleHandle>, Vec<usize>) {
        (self.samples.to_vec(), self.labels.to_vec())
    }
}
