//! Concurrent batch generation for image-classification training.
//!
//! Turns a dataset of in-memory tensors or lazily decoded image files into
//! standardized, optionally augmented `[k, H, W, C]` batches with one-hot labels,
//! either on the calling thread or on a persistent worker pool.

pub mod dataset;
pub mod encoder;
pub mod error;
pub mod generator;
pub mod readers;
pub mod sample;
pub mod sampler;
pub mod transforms;

pub use dataset::{InMemorySource, SampleSource};
pub use encoder::CategoricalEncoder;
pub use error::PipelineError;
pub use generator::{
    build_generator, Batch, BatchAssembler, BatchGenerator, BatchIter, GeneratorConfig,
    GeneratorConfigBuilder, IndexBatch, IndexSequencer, ParallelBatchAssembler,
};
pub use readers::ImageFolderSource;
pub use sample::{LazySample, SampleHandle, TargetSize};
pub use transforms::{AugmentationConfig, AugmentationPipeline};
