//! src/generator/sequencer.rs
//!
//! Epoch-bounded, endlessly restarting index scheduling.
//!
//! ```text
//!            next_batch_indices()
//!   Unstarted ───────────────────► EpochActive ──┐ emits order[pos..pos+batch_size]
//!                                   ▲     │      │
//!                  next call:       │     └──────┘
//!                  epoch += 1,      │     │ last index handed out
//!                  new order        │     ▼
//!                                 EpochExhausted
//! ```
//!
//! The cursor mutex is the only synchronized region of batch production; it is held
//! just long enough to copy one slice of indices.

use crate::error::PipelineError;
use crate::sampler::{RandomSampler, Sampler, SequentialSampler};
use anyhow::{anyhow, ensure, Result};
use std::sync::{Mutex, MutexGuard};

/// Lifecycle of the sequencer's cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochState {
    /// No index batch has been requested yet.
    Unstarted,
    /// The current epoch still has indices left.
    EpochActive,
    /// Every index of the current epoch has been handed out.
    EpochExhausted,
}

/// One slice of an epoch's ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBatch {
    /// Epoch the indices were drawn from (0-based).
    pub epoch: usize,
    /// Dataset indices, in the order their samples appear in the batch.
    pub indices: Vec<usize>,
}

impl IndexBatch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug)]
struct Cursor {
    state: EpochState,
    epoch: usize,
    order: Vec<usize>,
    position: usize,
}

/// Hands out consecutive index batches of one epoch ordering, then starts the next
/// epoch on the following call.
pub struct IndexSequencer {
    sampler: Box<dyn Sampler<Item = usize>>,
    len: usize,
    batch_size: usize,
    cursor: Mutex<Cursor>,
}

impl IndexSequencer {
    /// Creates a sequencer over `len` indices.
    ///
    /// With `shuffle`, epoch `e` visits the permutation seeded by `seed + e`;
    /// otherwise every epoch is `0..len`.
    pub fn new(len: usize, batch_size: usize, shuffle: bool, seed: u64) -> Result<Self> {
        ensure!(
            batch_size > 0,
            PipelineError::config("batch_size must be at least 1")
        );
        ensure!(
            len > 0,
            PipelineError::config("cannot schedule batches over an empty dataset")
        );
        let sampler: Box<dyn Sampler<Item = usize>> = if shuffle {
            Box::new(RandomSampler::new(len, seed)?)
        } else {
            Box::new(SequentialSampler::new(len))
        };
        Ok(Self {
            sampler,
            len,
            batch_size,
            cursor: Mutex::new(Cursor {
                state: EpochState::Unstarted,
                epoch: 0,
                order: Vec::new(),
                position: 0,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Cursor>> {
        self.cursor
            .lock()
            .map_err(|_| anyhow!("Index sequencer lock poisoned by a panicked thread"))
    }

    /// Returns the next index batch, starting a new epoch when the current one is
    /// exhausted (or none has started yet).
    pub fn next_batch_indices(&self) -> Result<IndexBatch> {
        let mut cursor = self.lock()?;
        match cursor.state {
            EpochState::Unstarted => self.start_epoch(&mut cursor, 0),
            EpochState::EpochExhausted => {
                let next = cursor.epoch + 1;
                self.start_epoch(&mut cursor, next);
            }
            EpochState::EpochActive => {}
        }

        let start = cursor.position;
        let end = (start + self.batch_size).min(self.len);
        let indices = cursor.order[start..end].to_vec();
        cursor.position = end;
        if end == self.len {
            cursor.state = EpochState::EpochExhausted;
        }
        Ok(IndexBatch {
            epoch: cursor.epoch,
            indices,
        })
    }

    fn start_epoch(&self, cursor: &mut Cursor, epoch: usize) {
        cursor.epoch = epoch;
        cursor.order = self.sampler.iter(epoch).collect();
        cursor.position = 0;
        cursor.state = EpochState::EpochActive;
    }

    /// The epoch currently in progress (0 before the first batch).
    pub fn epoch(&self) -> Result<usize> {
        Ok(self.lock()?.epoch)
    }

    pub fn state(&self) -> Result<EpochState> {
        Ok(self.lock()?.state)
    }

    /// `ceil(len / batch_size)`
    pub fn batches_per_epoch(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
