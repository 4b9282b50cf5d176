use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{ArrayD, IxDyn};

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an image to a channels-last f32 array in [0.0, 1.0] range.
///
/// Channel Handling
/// | Input Format  | Output Shape |
/// |---------------|--------------|
/// | Grayscale (L) | `[H, W, 1]`  |
/// | RGB           | `[H, W, 3]`  |
/// | RGBA          | `[H, W, 4]`  |
/// | Other         | `[H, W, 3]`  |
/// Note: *16-bit, float and other layouts undergo implicit conversion to RGB8.
#[derive(Debug, Clone, Copy)]
pub struct ToTensor;

impl Transform<DynamicImage, ArrayD<f32>> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<ArrayD<f32>> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );

        let (channels, raw) = match img {
            DynamicImage::ImageLuma8(img) => (1, img.into_raw()),
            DynamicImage::ImageRgb8(img) => (3, img.into_raw()),
            DynamicImage::ImageRgba8(img) => (4, img.into_raw()),
            // Handle all other cases via conversion to RGB
            other => (3, other.to_rgb8().into_raw()),
        };

        let values = raw.into_iter().map(|v| v as f32 / 255.0).collect();
        ArrayD::from_shape_vec(IxDyn(&[height as usize, width as usize, channels]), values)
            .context("Failed to build tensor from image pixels")
    }
}
