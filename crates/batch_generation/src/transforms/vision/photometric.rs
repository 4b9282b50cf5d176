use crate::error::PipelineError;
use crate::transforms::{RandomizedTransform, Transform};
use anyhow::{ensure, Result};
use ndarray::{Array1, ArrayD, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Added to the standard deviation before dividing, as featurewise normalization does.
const STD_EPSILON: f32 = 1e-6;

// ============================================================================
// FeatureStats
// ============================================================================

/// Per-channel mean and standard deviation computed over a whole sample set.
///
/// Channels are the last axis of a sample (`[H, W, C]`), so the statistics are shared
/// by every pixel position and can be applied to a batch `[k, H, W, C]` as well as to
/// a single sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: Array1<f32>,
    pub std: Array1<f32>,
}

impl FeatureStats {
    /// Computes the population mean and standard deviation of every channel.
    pub fn fit(samples: &[ArrayD<f32>]) -> Result<Self> {
        ensure!(
            !samples.is_empty(),
            PipelineError::config("cannot fit feature statistics on an empty sample set")
        );
        let reference = samples[0].shape().to_vec();
        ensure!(
            !reference.is_empty(),
            PipelineError::config("cannot fit feature statistics on scalar samples")
        );

        let channels = reference[reference.len() - 1];
        let mut sum = Array1::<f64>::zeros(channels);
        let mut sum_sq = Array1::<f64>::zeros(channels);
        let mut count = 0usize;

        for (position, sample) in samples.iter().enumerate() {
            ensure!(
                sample.shape() == reference.as_slice(),
                PipelineError::ShapeMismatch {
                    position,
                    expected: reference.clone(),
                    found: sample.shape().to_vec(),
                }
            );
            let last = Axis(sample.ndim() - 1);
            for (c, channel) in sample.axis_iter(last).enumerate() {
                for &v in channel.iter() {
                    let v = v as f64;
                    sum[c] += v;
                    sum_sq[c] += v * v;
                }
            }
            count += sample.len() / channels.max(1);
        }

        let n = count.max(1) as f64;
        let mean = sum.mapv(|s| s / n);
        let std = (&sum_sq / n - &mean * &mean).mapv(|var| var.max(0.0).sqrt());
        Ok(Self {
            mean: mean.mapv(|m| m as f32),
            std: std.mapv(|s| s as f32),
        })
    }

    pub fn channels(&self) -> usize {
        self.mean.len()
    }
}

// ============================================================================
// Standardize
// ============================================================================

/// Which whole-batch standardization steps run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizeConfig {
    /// Multiplies every value first (e.g. `1/255`).
    pub rescale: Option<f32>,
    /// Subtracts the fitted per-channel mean.
    pub featurewise_center: bool,
    /// Divides by the fitted per-channel standard deviation.
    pub featurewise_std_normalization: bool,
}

/// Whole-batch standardization with dataset-level (not per-sample) statistics.
///
/// # Mathematical Operation:
/// ```text
/// x = x * rescale
/// x = x - mean[c]                (featurewise_center)
/// x = x / (std[c] + 1e-6)        (featurewise_std_normalization)
/// ```
#[derive(Debug, Clone)]
pub struct Standardize {
    config: StandardizeConfig,
    stats: Option<FeatureStats>,
}

impl Standardize {
    pub fn new(config: StandardizeConfig, stats: Option<FeatureStats>) -> Result<Self> {
        let needs_stats = config.featurewise_center || config.featurewise_std_normalization;
        ensure!(
            !needs_stats || stats.is_some(),
            PipelineError::config(
                "featurewise standardization requires fitted feature statistics"
            )
        );
        if let Some(stats) = &stats {
            ensure!(
                stats.mean.len() == stats.std.len() && !stats.mean.is_empty(),
                PipelineError::config(format!(
                    "feature statistics need one mean and one std per channel (got {} and {})",
                    stats.mean.len(),
                    stats.std.len()
                ))
            );
        }
        if let Some(rescale) = config.rescale {
            ensure!(
                rescale.is_finite() && rescale != 0.0,
                PipelineError::config(format!("rescale must be finite and non-zero (got {})", rescale))
            );
        }
        Ok(Self { config, stats })
    }

    /// A standardization step that leaves values unchanged.
    pub fn identity() -> Self {
        Self {
            config: StandardizeConfig::default(),
            stats: None,
        }
    }

    fn fitted(&self, batch: &ArrayD<f32>) -> Result<&FeatureStats> {
        let stats = self
            .stats
            .as_ref()
            .ok_or_else(|| PipelineError::config("feature statistics were not fitted"))?;
        let channels = batch.shape().last().copied().unwrap_or(0);
        ensure!(
            channels == stats.channels(),
            "Channel count mismatch: batch has {} channels but statistics cover {}",
            channels,
            stats.channels()
        );
        Ok(stats)
    }
}

impl Transform<ArrayD<f32>, ArrayD<f32>> for Standardize {
    fn apply(&self, mut batch: ArrayD<f32>) -> Result<ArrayD<f32>> {
        if let Some(rescale) = self.config.rescale {
            batch.mapv_inplace(|v| v * rescale);
        }
        if self.config.featurewise_center {
            let stats = self.fitted(&batch)?;
            batch.zip_mut_with(&stats.mean, |v, &m| *v -= m);
        }
        if self.config.featurewise_std_normalization {
            let stats = self.fitted(&batch)?;
            batch.zip_mut_with(&stats.std, |v, &s| *v /= s + STD_EPSILON);
        }
        Ok(batch)
    }
}

// ============================================================================
// ContrastNormalization
// ============================================================================

/// With probability `p`, scales the contrast of the whole batch by a factor drawn
/// uniformly from `alpha_range`:
///
/// ```text
/// x = alpha * x
/// ```
///
/// Batches reaching this step are already standardized, so contrast is scaled around 0.
#[derive(Debug, Clone)]
pub struct ContrastNormalization {
    p: f64,
    alpha_range: (f32, f32),
}

impl ContrastNormalization {
    pub fn new(p: f64, alpha_range: (f32, f32)) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            PipelineError::config(format!("Probability must be in [0.0, 1.0] range (got {})", p))
        );
        ensure!(
            alpha_range.1.is_finite() && alpha_range.0 > 0.0 && alpha_range.0 <= alpha_range.1,
            PipelineError::config(format!(
                "Contrast range must be finite and satisfy 0 < low <= high (got {:?})",
                alpha_range
            ))
        );
        Ok(Self { p, alpha_range })
    }
}

impl Default for ContrastNormalization {
    fn default() -> Self {
        Self {
            p: 0.5,
            alpha_range: (0.75, 1.5),
        }
    }
}

impl RandomizedTransform<ArrayD<f32>> for ContrastNormalization {
    fn apply_with(&self, mut batch: ArrayD<f32>, rng: &mut StdRng) -> Result<ArrayD<f32>> {
        if rng.random_bool(self.p) {
            let alpha = rng.random_range(self.alpha_range.0..=self.alpha_range.1);
            batch.mapv_inplace(|v| alpha * v);
        }
        Ok(batch)
    }
}

// ============================================================================
// RandomBrightness
// ============================================================================

/// Multiplies a sample by a factor drawn uniformly from `range`.
#[derive(Debug, Clone)]
pub struct RandomBrightness {
    range: (f32, f32),
}

impl RandomBrightness {
    pub fn new(range: (f32, f32)) -> Result<Self> {
        ensure!(
            range.1.is_finite() && range.0 > 0.0 && range.0 <= range.1,
            PipelineError::config(format!(
                "Brightness range must be finite and satisfy 0 < low <= high (got {:?})",
                range
            ))
        );
        Ok(Self { range })
    }
}

impl RandomizedTransform<ArrayD<f32>> for RandomBrightness {
    fn apply_with(&self, mut sample: ArrayD<f32>, rng: &mut StdRng) -> Result<ArrayD<f32>> {
        let factor = rng.random_range(self.range.0..=self.range.1);
        sample.mapv_inplace(|v| v * factor);
        Ok(sample)
    }
}
