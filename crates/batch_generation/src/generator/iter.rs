//! src/generator/iter.rs
//!
//! Endless iteration over a generator.

use super::batch::Batch;
use super::BatchGenerator;
use anyhow::Result;

/// Iterator over batches of a [`BatchGenerator`].
///
/// Created by calling `generator.iter()`. Epochs restart automatically, so the
/// iterator never returns `None`: bound it with `take(n)` or by checking
/// `batch.epoch`. Errors are yielded as items and do not end the iteration.
pub struct BatchIter<'a> {
    generator: &'a dyn BatchGenerator,
}

impl<'a> BatchIter<'a> {
    pub fn new(generator: &'a dyn BatchGenerator) -> Self {
        Self { generator }
    }
}

impl Iterator for BatchIter<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generator.next_batch())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
