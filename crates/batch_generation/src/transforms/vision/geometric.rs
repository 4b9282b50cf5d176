use crate::error::PipelineError;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::{ArrayD, Axis, Slice};

// ============================================================================
// Resize
// ============================================================================

/// Resizes an image to exactly the requested dimension.
///
/// The aspect ratio is not preserved: every sample of a batch must land in the
/// same buffer shape, so the target size wins.
///
/// # Filter Types
/// - `Nearest`: Nearest neighbour, fastest
/// - `Triangle`: Bilinear filter, good all-round default
/// - `CatmullRom`: Bicubic sharpening
/// - `Lanczos3`: Highest quality re-sampling but slowest.
#[derive(Debug, Clone)]
pub struct Resize {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Resize {
    /// Creates a new Resize transform.
    pub fn new(width: u32, height: u32, filter: FilterType) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            PipelineError::config(format!(
                "Image dimensions must be positive after resizing (got {}x{})",
                width, height
            ))
        );
        Ok(Self {
            width,
            height,
            filter,
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for Resize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if img.width() == self.width && img.height() == self.height {
            return Ok(img);
        }
        Ok(img.resize_exact(self.width, self.height, self.filter))
    }
}

// ============================================================================
// Array geometry on channels-last samples `[H, W, ...]`
// ============================================================================

fn ensure_spatial(sample: &ArrayD<f32>) -> Result<()> {
    ensure!(
        sample.ndim() >= 2,
        "Geometric transforms need at least 2 spatial axes (got shape {:?})",
        sample.shape()
    );
    Ok(())
}

/// Mirrors a sample left-to-right.
#[derive(Debug, Clone, Copy)]
pub struct HorizontalFlip;

impl Transform<ArrayD<f32>, ArrayD<f32>> for HorizontalFlip {
    fn apply(&self, mut sample: ArrayD<f32>) -> Result<ArrayD<f32>> {
        ensure_spatial(&sample)?;
        sample.invert_axis(Axis(1));
        Ok(sample.as_standard_layout().into_owned())
    }
}

/// Mirrors a sample top-to-bottom.
#[derive(Debug, Clone, Copy)]
pub struct VerticalFlip;

impl Transform<ArrayD<f32>, ArrayD<f32>> for VerticalFlip {
    fn apply(&self, mut sample: ArrayD<f32>) -> Result<ArrayD<f32>> {
        ensure_spatial(&sample)?;
        sample.invert_axis(Axis(0));
        Ok(sample.as_standard_layout().into_owned())
    }
}

/// Translates a sample by `(dx, dy)` pixels, filling uncovered pixels with zero.
/// Positive `dx` moves content right, positive `dy` moves it down.
#[derive(Debug, Clone, Copy)]
pub struct Shift {
    pub dx: isize,
    pub dy: isize,
}

impl Shift {
    /// Source and destination ranges along one axis of length `len`.
    fn ranges(offset: isize, len: usize) -> Option<(Slice, Slice)> {
        let magnitude = offset.unsigned_abs();
        if magnitude >= len {
            return None;
        }
        let kept = len - magnitude;
        Some(if offset >= 0 {
            (Slice::from(0..kept), Slice::from(magnitude..len))
        } else {
            (Slice::from(magnitude..len), Slice::from(0..kept))
        })
    }
}

impl Transform<ArrayD<f32>, ArrayD<f32>> for Shift {
    fn apply(&self, sample: ArrayD<f32>) -> Result<ArrayD<f32>> {
        ensure_spatial(&sample)?;
        if self.dx == 0 && self.dy == 0 {
            return Ok(sample);
        }

        let mut shifted = ArrayD::zeros(sample.raw_dim());
        let (height, width) = (sample.shape()[0], sample.shape()[1]);
        let (Some((src_rows, dst_rows)), Some((src_cols, dst_cols))) =
            (Self::ranges(self.dy, height), Self::ranges(self.dx, width))
        else {
            // Shifted entirely out of frame
            return Ok(shifted);
        };

        let source = sample.slice_each_axis(|ax| match ax.axis.index() {
            0 => src_rows,
            1 => src_cols,
            _ => Slice::from(..),
        });
        shifted
            .slice_each_axis_mut(|ax| match ax.axis.index() {
                0 => dst_rows,
                1 => dst_cols,
                _ => Slice::from(..),
            })
            .assign(&source);
        Ok(shifted)
    }
}
