//! Integer label → one-hot vector conversion.

use crate::error::PipelineError;
use anyhow::{ensure, Result};
use ndarray::{Array1, Array2, ArrayView1};

/// Encodes class labels as one-hot rows of length `nclasses`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoricalEncoder;

impl CategoricalEncoder {
    /// Returns a vector of zeros with a single `1.0` at offset `label`.
    pub fn encode(label: usize, nclasses: usize) -> Result<Array1<f32>> {
        ensure!(label < nclasses, PipelineError::LabelRange { label, nclasses });
        let mut one_hot = Array1::zeros(nclasses);
        one_hot[label] = 1.0;
        Ok(one_hot)
    }

    /// Encodes a list of labels into a `[labels.len(), nclasses]` matrix.
    pub fn encode_batch(labels: &[usize], nclasses: usize) -> Result<Array2<f32>> {
        let mut matrix = Array2::zeros((labels.len(), nclasses));
        for (row, &label) in labels.iter().enumerate() {
            ensure!(label < nclasses, PipelineError::LabelRange { label, nclasses });
            matrix[[row, label]] = 1.0;
        }
        Ok(matrix)
    }

    /// Recovers the label from a one-hot row.
    /// Rejects rows that are not exactly one `1.0` among zeros.
    pub fn decode(one_hot: ArrayView1<'_, f32>) -> Result<usize> {
        let mut hot = None;
        for (offset, &value) in one_hot.iter().enumerate() {
            if value == 1.0 && hot.is_none() {
                hot = Some(offset);
            } else {
                ensure!(
                    value == 0.0,
                    "Not a one-hot vector: unexpected value {} at offset {}",
                    value,
                    offset
                );
            }
        }
        hot.ok_or_else(|| anyhow::anyhow!("Not a one-hot vector: no element is set"))
    }
}
