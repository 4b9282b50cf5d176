//! Error kinds raised while producing batches.
//!
//! Every public operation returns `anyhow::Result`; when the failure belongs to one of
//! the kinds below, a [`PipelineError`] is the root cause and can be recovered with
//! `err.downcast_ref::<PipelineError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid generator, augmentation, or pool configuration supplied at construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The sample at `index` could not be read or decoded. Aborts the containing batch.
    #[error("failed to decode sample {index}")]
    Decode {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A label outside `[0, nclasses)`. Indicates a corrupted upstream dataset.
    #[error("label {label} is out of range for {nclasses} classes")]
    LabelRange { label: usize, nclasses: usize },

    /// A sample whose shape differs from the shape the batch buffer was allocated with.
    #[error("sample at batch position {position} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        position: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// A dataset offset past the last sample.
    #[error("offset {offset} is out of range for a dataset of {len} samples")]
    IndexOutOfRange { offset: usize, len: usize },
}

impl PipelineError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_decode_error_keeps_source() {
        let err = PipelineError::Decode {
            index: 4,
            source: anyhow!("truncated PNG"),
        };
        assert_eq!(err.to_string(), "failed to decode sample 4");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("truncated PNG"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = PipelineError::LabelRange {
            label: 12,
            nclasses: 10,
        }
        .into();
        let err = err.context("Failed to encode labels");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::LabelRange { label: 12, .. })
        ));
    }
}
