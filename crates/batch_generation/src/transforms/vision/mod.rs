//! src/transforms/vision/mod.rs
//!
//! Vision transforms for decoding, augmenting and standardizing image samples.
//!
//! # Module Organization
//!
//! ```text
//! transforms/vision/
//! ├── geometric.rs     → Spatial transformations (resize, flip, shift)
//! ├── photometric.rs   → Value transformations (standardize, contrast, brightness)
//! ├── conversion.rs    → Format conversions (image → tensor)
//! ├── augmentation.rs  → Composite per-sample random transform
//! └── io.rs            → Image loading and lazily decoded image samples
//! ```
//!
//! Samples are channels-last `[H, W, C]` arrays; batches add a leading axis.

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod photometric;

pub use augmentation::{RandomTransform, RandomTransformConfig};
pub use conversion::ToTensor;
pub use geometric::{HorizontalFlip, Resize, Shift, VerticalFlip};
pub use io::{ImageFile, LoadImage};
pub use photometric::{
    ContrastNormalization, FeatureStats, RandomBrightness, Standardize, StandardizeConfig,
};
