//! Basic generator behaviour.
//!
//! Tests cover:
//! - Epoch partitioning and index order
//! - Label encoding, `input_n` fan-out, replay and raw access
//! - Lazy decoding, image folders end to end, standardization
//! - Config serialization

mod common;
use common::{marker_source, write_image_folder, CountingSample};

use batch_generation::{
    build_generator,
    readers::DEFAULT_EXTENSIONS,
    transforms::vision::{FeatureStats, StandardizeConfig},
    AugmentationConfig, AugmentationPipeline, BatchAssembler, BatchGenerator, CategoricalEncoder,
    GeneratorConfig, ImageFolderSource, ParallelBatchAssembler, SampleHandle, SampleSource,
};

use anyhow::Result;
use ndarray::Axis;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn sequential(n: usize, batch_size: usize, shuffle: bool) -> Result<BatchAssembler> {
    let config = GeneratorConfig::builder()
        .batch_size(batch_size)
        .shuffle(shuffle)
        .nclasses(3)
        .build()?;
    BatchAssembler::new(marker_source(n, 3), config, AugmentationPipeline::passthrough())
}

// ============================================================================
// Epochs and ordering
// ============================================================================

#[test]
fn test_epoch_batch_sizes() -> Result<()> {
    let generator = sequential(10, 3, false)?;
    let sizes: Vec<usize> = generator
        .iter()
        .take(4)
        .map(|b| b.map(|b| b.len()))
        .collect::<Result<_>>()?;
    assert_eq!(sizes, vec![3, 3, 3, 1]);
    assert_eq!(generator.batches_per_epoch(), 4);
    Ok(())
}

#[test]
fn test_epoch_lengths_sum_to_dataset_size() -> Result<()> {
    for (n, batch_size) in [(1, 1), (7, 7), (8, 3), (25, 4), (9, 16)] {
        let generator = sequential(n, batch_size, true)?;
        let mut total = 0;
        let mut last = 0;
        for batch in generator.iter().take(generator.batches_per_epoch()) {
            let batch = batch?;
            assert_eq!(batch.epoch, 0);
            last = batch.len();
            total += last;
        }
        assert_eq!(total, n);
        let expected_last = if n % batch_size == 0 { batch_size.min(n) } else { n % batch_size };
        assert_eq!(last, expected_last);
    }
    Ok(())
}

#[test]
fn test_unshuffled_batches_are_contiguous_ranges() -> Result<()> {
    let generator = sequential(8, 3, false)?;
    for k in 0..3 {
        let batch = generator.next_batch()?;
        let expected: Vec<usize> = (k * 3..((k + 1) * 3).min(8)).collect();
        assert_eq!(batch.indices, expected);

        for (position, &index) in batch.indices.iter().enumerate() {
            let sample = batch.input().index_axis(Axis(0), position);
            assert_eq!(sample[[0, 0, 0]], (index * 16) as f32);
        }
    }
    Ok(())
}

#[test]
fn test_epochs_restart_automatically() -> Result<()> {
    let generator = sequential(5, 5, true)?;
    let first = generator.next_batch()?;
    let second = generator.next_batch()?;
    assert_eq!((first.epoch, second.epoch), (0, 1));
    assert_eq!(generator.epoch()?, 1);

    let mut sorted = second.indices.clone();
    sorted.sort();
    assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
    Ok(())
}

// ============================================================================
// Labels and outputs
// ============================================================================

#[test]
fn test_labels_are_one_hot_rows() -> Result<()> {
    let generator = sequential(9, 4, true)?;
    for batch in generator.iter().take(3) {
        let batch = batch?;
        assert_eq!(batch.labels.dim(), (batch.len(), 3));
        for (row, &index) in batch.labels.outer_iter().zip(&batch.indices) {
            assert_eq!(row.sum(), 1.0);
            assert_eq!(CategoricalEncoder::decode(row)?, index % 3);
        }
    }
    Ok(())
}

#[test]
fn test_one_hot_of_seven_in_ten() -> Result<()> {
    let one_hot = CategoricalEncoder::encode(7, 10)?;
    assert_eq!(one_hot.len(), 10);
    for (offset, &value) in one_hot.iter().enumerate() {
        assert_eq!(value, if offset == 7 { 1.0 } else { 0.0 });
    }
    Ok(())
}

#[test]
fn test_input_n_shares_one_buffer() -> Result<()> {
    let config = GeneratorConfig::builder()
        .batch_size(4)
        .nclasses(3)
        .input_n(3)
        .build()?;
    let generator = BatchAssembler::new(
        marker_source(8, 3),
        config.clone(),
        AugmentationPipeline::passthrough(),
    )?;
    let batch = generator.next_batch()?;
    assert_eq!(batch.inputs.len(), 3);
    assert!(Arc::ptr_eq(&batch.inputs[0], &batch.inputs[1]));
    assert!(Arc::ptr_eq(&batch.inputs[0], &batch.inputs[2]));

    let parallel = ParallelBatchAssembler::new(
        marker_source(8, 3),
        config,
        AugmentationPipeline::passthrough(),
    )?;
    let batch = parallel.next_batch()?;
    assert!(Arc::ptr_eq(&batch.inputs[0], &batch.inputs[2]));
    Ok(())
}

#[test]
fn test_batch_at_and_raw_access() -> Result<()> {
    let generator = sequential(7, 3, true)?;
    generator.next_batch()?;

    let replay = generator.batch_at(5)?;
    assert_eq!(replay.indices, vec![5, 6]);
    assert_eq!(replay.input()[[1, 0, 0, 0]], (6 * 16) as f32);
    // Replay does not move the epoch cursor.
    assert_eq!(generator.epoch()?, 0);
    assert!(generator.batch_at(7).is_err());

    assert_eq!(generator.sample_count(), 7);
    let (samples, labels) = generator.raw_data();
    assert_eq!(samples.len(), 7);
    assert_eq!(labels, generator.labels_at(None)?);
    assert_eq!(generator.labels_at(Some(&[4, 5]))?, vec![1, 2]);
    Ok(())
}

// ============================================================================
// Lazy samples and image folders
// ============================================================================

#[test]
fn test_lazy_samples_are_decoded_for_every_batch() -> Result<()> {
    let decodes = Arc::new(AtomicUsize::new(0));
    let samples = (0..4)
        .map(|i| SampleHandle::lazy(CountingSample::new(&[2, 2, 3], i as f32, decodes.clone())))
        .collect();
    let source = common::lazy_source(samples);
    let config = GeneratorConfig::builder()
        .batch_size(2)
        .nclasses(1)
        .build()?;
    let generator = BatchAssembler::new(source, config, AugmentationPipeline::passthrough())?;

    for batch in generator.iter().take(4) {
        batch?;
    }
    // Two epochs, no caching between them.
    assert_eq!(decodes.load(Ordering::SeqCst), 8);
    Ok(())
}

#[test]
fn test_image_folder_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    write_image_folder(dir.path(), &["benign", "malignant"], 3, 7, 5)?;
    let source = ImageFolderSource::open(dir.path(), DEFAULT_EXTENSIONS)?;
    assert_eq!(source.nclasses(), 2);
    assert_eq!(source.len(), 6);

    let config = GeneratorConfig::builder()
        .batch_size(4)
        .nclasses(source.nclasses())
        .target_size(4, 4)
        .build()?;

    for threaded in [false, true] {
        let generator = build_generator(
            Arc::new(source.clone()),
            config.clone(),
            AugmentationPipeline::passthrough(),
            threaded,
        )?;
        let batch = generator.next_batch()?;
        assert_eq!(batch.input().shape(), &[4, 4, 4, 3]);
        assert!(batch.input().iter().all(|&v| (0.0..=1.0).contains(&v)));

        let expected = generator.labels_at(Some(&batch.indices))?;
        for (row, label) in batch.labels.outer_iter().zip(expected) {
            assert_eq!(CategoricalEncoder::decode(row)?, label);
        }
    }
    Ok(())
}

#[test]
fn test_featurewise_standardization() -> Result<()> {
    let source = marker_source(4, 2);
    let (handles, _) = source.raw_data();
    let samples = handles
        .iter()
        .map(|h| h.resolve(None, 0))
        .collect::<Result<Vec<_>>>()?;
    let stats = FeatureStats::fit(&samples)?;

    let augmentation = AugmentationConfig {
        standardize: StandardizeConfig {
            featurewise_center: true,
            featurewise_std_normalization: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let config = GeneratorConfig::builder()
        .batch_size(4)
        .shuffle(false)
        .nclasses(2)
        .build()?;
    let generator =
        BatchAssembler::new(source, config, AugmentationPipeline::new(augmentation, Some(stats))?)?;

    let batch = generator.next_batch()?;
    let input = batch.input();
    let n = input.len() as f32;
    let mean = input.sum() / n;
    let var = input.mapv(|v| (v - mean) * (v - mean)).sum() / n;
    assert!(mean.abs() < 1e-4, "mean = {}", mean);
    assert!((var - 1.0).abs() < 1e-3, "var = {}", var);
    Ok(())
}

// ============================================================================
// Configuration files
// ============================================================================

#[test]
fn test_config_serde_round_trip() -> Result<()> {
    let config = GeneratorConfig::builder()
        .batch_size(16)
        .seed(7)
        .nclasses(4)
        .target_size(240, 240)
        .extra_aug(true)
        .input_n(2)
        .build()?;
    let json = serde_json::to_string(&config)?;
    assert_eq!(serde_json::from_str::<GeneratorConfig>(&json)?, config);

    // Missing fields take their defaults.
    let partial: GeneratorConfig = serde_json::from_str(r#"{"batch_size": 4, "nclasses": 10}"#)?;
    assert_eq!(partial.batch_size, 4);
    assert_eq!(partial.seed, 173);
    assert!(partial.shuffle);

    let augmentation: AugmentationConfig =
        serde_json::from_str(r#"{"random_transform": true, "transform": {"width_shift_range": 0.1}}"#)?;
    assert!(augmentation.random_transform);
    assert!(augmentation.transform.horizontal_flip);
    assert_eq!(augmentation.transform.width_shift_range, 0.1);
    Ok(())
}
