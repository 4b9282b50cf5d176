pub mod core;
pub mod pipeline;
pub mod vision;

pub use core::{Chain, RandomizedTransform, Transform};
pub use pipeline::{AugmentationConfig, AugmentationPipeline};
