#![allow(dead_code)]

use batch_generation::{InMemorySource, LazySample, SampleHandle, TargetSize};

use anyhow::{bail, Result};
use image::{Rgb, RgbImage};
use ndarray::{ArrayD, IxDyn};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Sample `i` is a `[4, 4, 1]` tensor whose pixel `(y, x)` holds `i * 16 + y * 4 + x`,
/// so both its index and any flip/shift can be read back. Labels are `i % nclasses`.
pub fn marker_source(n: usize, nclasses: usize) -> InMemorySource {
    let samples = (0..n)
        .map(|i| {
            let values = (0..16).map(|p| (i * 16 + p) as f32).collect();
            SampleHandle::tensor(ArrayD::from_shape_vec(IxDyn(&[4, 4, 1]), values).unwrap())
        })
        .collect();
    let labels = (0..n).map(|i| i % nclasses).collect();
    InMemorySource::new(samples, labels).unwrap()
}

/// Builds a source from lazy handles, labelled 0.
pub fn lazy_source(samples: Vec<SampleHandle>) -> InMemorySource {
    let n = samples.len();
    InMemorySource::new(samples, vec![0; n]).unwrap()
}

/// Returns a constant tensor of `shape` and counts how often it was decoded.
#[derive(Debug, Clone)]
pub struct CountingSample {
    pub shape: Vec<usize>,
    pub value: f32,
    pub decodes: Arc<AtomicUsize>,
}

impl CountingSample {
    pub fn new(shape: &[usize], value: f32, decodes: Arc<AtomicUsize>) -> Self {
        Self {
            shape: shape.to_vec(),
            value,
            decodes,
        }
    }
}

impl LazySample for CountingSample {
    fn decode(&self, _: Option<TargetSize>, _: u8) -> Result<ArrayD<f32>> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        Ok(ArrayD::from_elem(IxDyn(&self.shape), self.value))
    }
}

/// Always fails to decode, like a truncated file.
#[derive(Debug)]
pub struct CorruptSample;

impl LazySample for CorruptSample {
    fn decode(&self, _: Option<TargetSize>, _: u8) -> Result<ArrayD<f32>> {
        bail!("unexpected end of file")
    }
}

/// Sleeps before returning a `[1]` tensor.
#[derive(Debug)]
pub struct SlowSample(pub Duration);

impl LazySample for SlowSample {
    fn decode(&self, _: Option<TargetSize>, _: u8) -> Result<ArrayD<f32>> {
        thread::sleep(self.0);
        Ok(ArrayD::zeros(IxDyn(&[1])))
    }
}

/// Writes `per_class` PNGs of `width x height` into `root/<class>/` for each class.
pub fn write_image_folder(
    root: &Path,
    classes: &[&str],
    per_class: usize,
    width: u32,
    height: u32,
) -> Result<()> {
    for (label, class) in classes.iter().enumerate() {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir)?;
        for i in 0..per_class {
            let shade = (label * 100 + i * 10) as u8;
            RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]))
                .save(dir.join(format!("{:03}.png", i)))?;
        }
    }
    Ok(())
}
