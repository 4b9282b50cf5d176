//! src/generator/config.rs
//!
//! Configuration for batch generation.
//!
//! Example:
//! ```ignore
//! let config = GeneratorConfig::builder()
//!     .batch_size(16)
//!     .nclasses(2)
//!     .target_size(240, 240)
//!     .seed(173)
//!     .build()?;
//! ```
//!
//! # Performance considerations:
//! - `batch_size`: also sizes the worker pool of the parallel assembler
//! - `num_workers`: overrides the computed pool size
//! - `timeout`: bounds how long a batch waits on a single worker result

use crate::error::PipelineError;
use crate::sample::TargetSize;
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the batch generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of samples per batch. The last batch of an epoch may be shorter.
    pub batch_size: usize,
    /// Whether to reshuffle the dataset at every epoch start
    pub shuffle: bool,
    /// Seeds both shuffling and the random transforms
    pub seed: u64,
    /// Length of every one-hot label vector
    pub nclasses: usize,
    /// Size lazily decoded samples are resized to. `None` keeps the decoded size.
    pub target_size: Option<TargetSize>,
    /// Apply the whole-batch contrast augmentation after standardization
    pub extra_aug: bool,
    /// Rediscover the sample shape for every batch instead of fixing it once
    pub variable_shape: bool,
    /// Number of model inputs fed from the same batch tensor
    pub input_n: usize,
    /// 0 = silent, 1 = lifecycle events, 2+ = every index batch
    pub verbose: u8,
    /// Maximum time to wait for one worker result.
    /// If exceeded, the batch fails (assuming workers are stuck). Default: 30s
    pub timeout: Duration,
    /// Worker threads for the parallel assembler. `None` derives it from `batch_size`.
    pub num_workers: Option<usize>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            shuffle: true,
            seed: 173,
            nclasses: 2,
            target_size: None,
            extra_aug: false,
            variable_shape: false,
            input_n: 1,
            verbose: 0,
            timeout: Duration::from_secs(30),
            num_workers: None,
        }
    }
}

impl GeneratorConfig {
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }

    /// Checks every field that has a restricted range.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.batch_size > 0,
            PipelineError::config("batch_size must be at least 1")
        );
        ensure!(
            self.nclasses > 0,
            PipelineError::config("nclasses must be at least 1")
        );
        ensure!(
            self.input_n > 0,
            PipelineError::config("input_n must be at least 1")
        );
        ensure!(
            self.num_workers != Some(0),
            PipelineError::config("num_workers must be at least 1 when set")
        );
        ensure!(
            !self.timeout.is_zero(),
            PipelineError::config("timeout must be non-zero")
        );
        if let Some(size) = self.target_size {
            ensure!(
                size.width > 0 && size.height > 0,
                PipelineError::config(format!(
                    "target size must be positive (got {}x{})",
                    size.width, size.height
                ))
            );
        }
        Ok(())
    }

    /// Size of the parallel assembler's pool.
    ///
    /// `round(batch_size / 3 + (batch_size % 3 > 0) + 0.5)` with ties rounded to
    /// even, unless overridden by `num_workers`.
    pub fn worker_count(&self) -> usize {
        if let Some(n) = self.num_workers {
            return n;
        }
        let remainder = if self.batch_size % 3 > 0 { 1.0 } else { 0.0 };
        let raw = self.batch_size as f64 / 3.0 + remainder + 0.5;
        (raw.round_ties_even() as usize).max(1)
    }
}

/// Builder for GeneratorConfig with method chaining
#[derive(Default)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    /// Set the batch size (must be > 0)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set whether to shuffle the dataset every epoch
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Set the random seed.
    ///
    /// This seed controls:
    /// - Data shuffling (if shuffle = true)
    /// - Per-sample random transforms
    /// - Whole-batch extra augmentation
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn nclasses(mut self, nclasses: usize) -> Self {
        self.config.nclasses = nclasses;
        self
    }

    /// Resize lazily decoded samples to `width x height`.
    pub fn target_size(mut self, width: u32, height: u32) -> Self {
        self.config.target_size = Some(TargetSize::new(width, height));
        self
    }

    pub fn extra_aug(mut self, extra_aug: bool) -> Self {
        self.config.extra_aug = extra_aug;
        self
    }

    pub fn variable_shape(mut self, variable_shape: bool) -> Self {
        self.config.variable_shape = variable_shape;
        self
    }

    /// Return `n` references to every batch tensor (ensemble inputs).
    pub fn input_n(mut self, n: usize) -> Self {
        self.config.input_n = n;
        self
    }

    pub fn verbose(mut self, level: u8) -> Self {
        self.config.verbose = level;
        self
    }

    /// Set the timeout for a single worker result.
    ///
    /// - Too low: May fail batches during legitimate heavy decoding
    /// - Too high: Delays detection of stuck workers.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Override the computed worker count
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = Some(workers);
        self
    }

    /// Validate and build the final configuration.
    pub fn build(self) -> Result<GeneratorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
