use crate::error::PipelineError;
use crate::transforms::vision::{HorizontalFlip, RandomBrightness, Shift, VerticalFlip};
use crate::transforms::{RandomizedTransform, Transform};
use anyhow::{ensure, Result};
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameters of the per-sample random geometric/photometric transform.
///
/// Shift ranges are fractions of the sample width/height; a range of `0.1` shifts
/// by up to ±10% of the axis length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomTransformConfig {
    pub horizontal_flip: bool,
    pub vertical_flip: bool,
    pub width_shift_range: f32,
    pub height_shift_range: f32,
    pub brightness_range: Option<(f32, f32)>,
}

impl Default for RandomTransformConfig {
    fn default() -> Self {
        Self {
            horizontal_flip: true,
            vertical_flip: true,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            brightness_range: None,
        }
    }
}

// ============================================================================
// RandomTransform
// ============================================================================

/// Randomly flips, shifts and re-lights a single `[H, W, C]` sample.
///
/// Draws happen in a fixed order (horizontal flip, vertical flip, dx, dy,
/// brightness) so two runs fed the same RNG produce the same sample.
///
/// # Example
/// ```ignore
/// let transform = RandomTransform::new(RandomTransformConfig::default())?;
/// let mut rng = derive_sample_rng(173, 0, 42);
/// let augmented = transform.apply_with(sample, &mut rng)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomTransform {
    config: RandomTransformConfig,
    brightness: Option<RandomBrightness>,
}

impl RandomTransform {
    pub fn new(config: RandomTransformConfig) -> Result<Self> {
        for (name, range) in [
            ("width_shift_range", config.width_shift_range),
            ("height_shift_range", config.height_shift_range),
        ] {
            ensure!(
                (0.0..1.0).contains(&range),
                PipelineError::config(format!("{} must be in [0.0, 1.0) (got {})", name, range))
            );
        }
        let brightness = config.brightness_range.map(RandomBrightness::new).transpose()?;
        Ok(Self { config, brightness })
    }

    pub fn config(&self) -> &RandomTransformConfig {
        &self.config
    }

    fn draw_shift(rng: &mut StdRng, range: f32, len: usize) -> isize {
        let max = (range * len as f32) as i64;
        if max > 0 {
            rng.random_range(-max..=max) as isize
        } else {
            0
        }
    }
}

impl RandomizedTransform<ArrayD<f32>> for RandomTransform {
    fn apply_with(&self, mut sample: ArrayD<f32>, rng: &mut StdRng) -> Result<ArrayD<f32>> {
        if self.config.horizontal_flip && rng.random_bool(0.5) {
            sample = HorizontalFlip.apply(sample)?;
        }
        if self.config.vertical_flip && rng.random_bool(0.5) {
            sample = VerticalFlip.apply(sample)?;
        }

        if self.config.width_shift_range > 0.0 || self.config.height_shift_range > 0.0 {
            ensure!(
                sample.ndim() >= 2,
                "Random shifts need at least 2 spatial axes (got shape {:?})",
                sample.shape()
            );
            let (height, width) = (sample.shape()[0], sample.shape()[1]);
            let dx = Self::draw_shift(rng, self.config.width_shift_range, width);
            let dy = Self::draw_shift(rng, self.config.height_shift_range, height);
            sample = Shift { dx, dy }.apply(sample)?;
        }

        if let Some(brightness) = &self.brightness {
            sample = brightness.apply_with(sample, rng)?;
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use rand::SeedableRng;

    fn marker_sample() -> ArrayD<f32> {
        let mut s = ArrayD::zeros(IxDyn(&[4, 4, 1]));
        s[[0, 0, 0]] = 1.0;
        s
    }

    #[test]
    fn test_same_rng_same_result() -> Result<()> {
        let config = RandomTransformConfig {
            width_shift_range: 0.5,
            height_shift_range: 0.5,
            brightness_range: Some((0.5, 1.5)),
            ..Default::default()
        };
        let transform = RandomTransform::new(config)?;

        let a = transform.apply_with(marker_sample(), &mut StdRng::seed_from_u64(7))?;
        let b = transform.apply_with(marker_sample(), &mut StdRng::seed_from_u64(7))?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_disabled_ops_leave_sample_unchanged() -> Result<()> {
        let config = RandomTransformConfig {
            horizontal_flip: false,
            vertical_flip: false,
            ..Default::default()
        };
        let transform = RandomTransform::new(config)?;
        let out = transform.apply_with(marker_sample(), &mut StdRng::seed_from_u64(0))?;
        assert_eq!(out, marker_sample());
        Ok(())
    }

    #[test]
    fn test_flips_keep_marker_in_a_corner() -> Result<()> {
        let transform = RandomTransform::new(RandomTransformConfig::default())?;
        for seed in 0..16 {
            let out = transform.apply_with(marker_sample(), &mut StdRng::seed_from_u64(seed))?;
            let corners = [out[[0, 0, 0]], out[[0, 3, 0]], out[[3, 0, 0]], out[[3, 3, 0]]];
            assert_eq!(corners.iter().sum::<f32>(), 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_ranges() {
        let wide = RandomTransformConfig {
            width_shift_range: 1.0,
            ..Default::default()
        };
        assert!(RandomTransform::new(wide).is_err());

        let dark = RandomTransformConfig {
            brightness_range: Some((0.0, 0.5)),
            ..Default::default()
        };
        assert!(RandomTransform::new(dark).is_err());

        let unbounded = RandomTransformConfig {
            brightness_range: Some((0.5, f32::INFINITY)),
            ..Default::default()
        };
        assert!(RandomTransform::new(unbounded).is_err());
    }

    #[test]
    fn test_shifts_stay_within_range() -> Result<()> {
        let config = RandomTransformConfig {
            horizontal_flip: false,
            vertical_flip: false,
            width_shift_range: 0.5,
            height_shift_range: 0.5,
            brightness_range: None,
        };
        let transform = RandomTransform::new(config)?;

        let mut moved = false;
        for seed in 0..32 {
            let out = transform.apply_with(marker_sample(), &mut StdRng::seed_from_u64(seed))?;
            // A 4x4 sample with range 0.5 shifts by at most 2 pixels on each axis.
            for ((y, x, _), &v) in out.indexed_iter().map(|(i, v)| ((i[0], i[1], i[2]), v)) {
                if v == 1.0 {
                    assert!(y <= 2 && x <= 2, "marker moved to ({}, {})", y, x);
                    moved |= (y, x) != (0, 0);
                }
            }
        }
        assert!(moved);
        Ok(())
    }
}
