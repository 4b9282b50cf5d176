use crate::transforms::vision::{
    ContrastNormalization, FeatureStats, RandomTransform, RandomTransformConfig, Standardize,
    StandardizeConfig,
};
use crate::transforms::{RandomizedTransform, Transform};
use anyhow::{Context, Result};
use ndarray::ArrayD;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Which augmentation steps run and how they are parameterized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Apply [`RandomTransform`] to every sample before it is stacked.
    pub random_transform: bool,
    /// Apply the probabilistic contrast transform to every standardized batch.
    pub extra_aug: bool,
    pub transform: RandomTransformConfig,
    pub standardize: StandardizeConfig,
}

/// The augmentation/normalization stages applied while a batch is assembled.
///
/// ```text
///   sample ──► [random transform] ──► stack ──► standardize ──► [extra aug] ──► batch
///              per sample, seeded       k samples   whole batch      whole batch, p = 0.5
/// ```
///
/// The pipeline holds no mutable state: every random step takes the RNG it should
/// draw from, so one `Arc<AugmentationPipeline>` serves all worker threads.
#[derive(Debug, Clone)]
pub struct AugmentationPipeline {
    random: Option<RandomTransform>,
    standardize: Standardize,
    extra: Option<ContrastNormalization>,
}

impl AugmentationPipeline {
    /// Builds the pipeline, validating every transform parameter.
    ///
    /// `stats` must be supplied when featurewise centering or normalization is enabled.
    pub fn new(config: AugmentationConfig, stats: Option<FeatureStats>) -> Result<Self> {
        let random = if config.random_transform {
            Some(RandomTransform::new(config.transform).context("Invalid random transform")?)
        } else {
            None
        };
        let standardize =
            Standardize::new(config.standardize, stats).context("Invalid standardization")?;
        let extra = config.extra_aug.then(ContrastNormalization::default);
        Ok(Self {
            random,
            standardize,
            extra,
        })
    }

    /// A pipeline that returns samples and batches unchanged.
    pub fn passthrough() -> Self {
        Self {
            random: None,
            standardize: Standardize::identity(),
            extra: None,
        }
    }

    /// Whether the per-sample stage draws random numbers.
    pub fn is_random(&self) -> bool {
        self.random.is_some()
    }

    pub fn extra_aug(&self) -> bool {
        self.extra.is_some()
    }

    /// Per-sample stage, run before the sample is written into the batch buffer.
    pub fn transform_sample(&self, sample: ArrayD<f32>, rng: &mut StdRng) -> Result<ArrayD<f32>> {
        match &self.random {
            Some(random) => random.apply_with(sample, rng),
            None => Ok(sample),
        }
    }

    /// Whole-batch stage: standardization always, then extra augmentation when
    /// either this pipeline or the caller (`extra`) enables it.
    pub fn finalize_batch(
        &self,
        batch: ArrayD<f32>,
        rng: &mut StdRng,
        extra: bool,
    ) -> Result<ArrayD<f32>> {
        let batch = self.standardize.apply(batch)?;
        match (&self.extra, extra) {
            (Some(contrast), _) => contrast.apply_with(batch, rng),
            (None, true) => ContrastNormalization::default().apply_with(batch, rng),
            (None, false) => Ok(batch),
        }
    }
}

impl Default for AugmentationPipeline {
    fn default() -> Self {
        Self::passthrough()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, IxDyn};
    use rand::SeedableRng;

    fn batch() -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[2, 1, 2, 1]), vec![0.0, 0.5, 1.0, 0.5]).unwrap()
    }

    #[test]
    fn test_passthrough_is_identity() -> Result<()> {
        let pipeline = AugmentationPipeline::passthrough();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(pipeline.transform_sample(batch(), &mut rng)?, batch());
        assert_eq!(pipeline.finalize_batch(batch(), &mut rng, false)?, batch());
        Ok(())
    }

    #[test]
    fn test_standardize_runs_before_extra_aug() -> Result<()> {
        let stats = FeatureStats {
            mean: Array1::from_elem(1, 0.5),
            std: Array1::from_elem(1, 1.0),
        };
        let config = AugmentationConfig {
            extra_aug: true,
            standardize: StandardizeConfig {
                featurewise_center: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let pipeline = AugmentationPipeline::new(config, Some(stats))?;

        // Contrast is scaled around 0, so centred zeros stay zero whatever alpha is drawn.
        for seed in 0..8 {
            let out = pipeline.finalize_batch(batch(), &mut StdRng::seed_from_u64(seed), false)?;
            assert_eq!(out[[0, 0, 1, 0]], 0.0);
            assert_eq!(out[[1, 0, 1, 0]], 0.0);
            assert!(out[[0, 0, 0, 0]] < 0.0);
        }
        Ok(())
    }

    #[test]
    fn test_extra_aug_from_caller() -> Result<()> {
        let pipeline = AugmentationPipeline::passthrough();
        let changed = (0..16).any(|seed| {
            let out = pipeline
                .finalize_batch(batch(), &mut StdRng::seed_from_u64(seed), true)
                .unwrap();
            out != batch()
        });
        assert!(changed);
        Ok(())
    }

    #[test]
    fn test_centering_without_stats_is_rejected() {
        let config = AugmentationConfig {
            standardize: StandardizeConfig {
                featurewise_std_normalization: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = AugmentationPipeline::new(config, None).unwrap_err();
        assert!(matches!(
            err.root_cause().downcast_ref::<crate::error::PipelineError>(),
            Some(crate::error::PipelineError::Configuration(_))
        ));
    }
}
