use crate::sample::{LazySample, TargetSize};
use crate::transforms::vision::{Resize, ToTensor};
use crate::transforms::Transform;
use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, ImageReader};
use ndarray::ArrayD;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

// ============================================================================
// LoadImage - Base image loader
// ============================================================================

/// Loads images from file paths.
///
/// Reads the whole file through a buffered reader, then lets the `image` crate guess
/// the format from its magic bytes rather than trusting the extension.
///
/// # Example
/// ```ignore
/// let loader = LoadImage::new();
/// let image = loader.apply(PathBuf::from("patch_0001.png"))?;
/// ```
#[derive(Debug, Clone)]
pub struct LoadImage {
    buffer_size: usize,
}

impl LoadImage {
    /// Creates a new image loader with an 8KB read buffer.
    pub fn new() -> Self {
        Self { buffer_size: 8192 }
    }

    fn load(&self, path: &Path) -> Result<DynamicImage> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;

        let file_size = file.metadata()?.len() as usize;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = Vec::with_capacity(file_size);
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;

        ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))
    }
}

impl Default for LoadImage {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<PathBuf, DynamicImage> for LoadImage {
    fn apply(&self, path: PathBuf) -> Result<DynamicImage> {
        self.load(&path)
    }
}

// ============================================================================
// ImageFile - lazily decoded sample
// ============================================================================

/// A dataset entry backed by an image file on disk.
///
/// Nothing is read until [`LazySample::decode`] is called; every call reopens the
/// file, so a dataset of `ImageFile`s costs one path per entry in memory.
#[derive(Debug, Clone)]
pub struct ImageFile {
    path: PathBuf,
    loader: LoadImage,
    filter: FilterType,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loader: LoadImage::new(),
            filter: FilterType::Triangle,
        }
    }

    /// Overrides the resampling filter used when a target size is requested.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LazySample for ImageFile {
    fn decode(&self, target_size: Option<TargetSize>, verbose: u8) -> Result<ArrayD<f32>> {
        if verbose > 2 {
            tracing::trace!(path = %self.path.display(), ?target_size, "decoding image");
        }
        let img = self.loader.apply(self.path.clone())?;
        match target_size {
            Some(size) => Resize::new(size.width, size.height, self.filter)?
                .then(ToTensor)
                .apply(img),
            None => ToTensor.apply(img),
        }
    }
}
