//! src/generator/parallel.rs
//!
//! Batch assembly with decode + per-sample transform on a worker pool.
//!
//! # Flow of one batch
//!
//! ```text
//!  caller thread                               worker threads
//!  ─────────────                               ──────────────
//!  next_indices() ── lock, slice, unlock
//!  submit DecodeTask{position, index} ×k ───►  load(index, epoch)
//!                                                  │
//!  recv_timeout ◄─────── DecodeOutput{position} ───┘ (any order)
//!  buffer.insert(position, sample)
//!  finish(): standardize, extra aug, labels
//! ```
//!
//! Workers never touch the output buffer. Each batch owns a private reply channel, so
//! concurrent `next_batch` callers sharing one pool cannot receive each other's
//! samples.

use super::assembly::BatchCore;
use super::batch::Batch;
use super::common::thread::current_worker_id;
use super::config::GeneratorConfig;
use super::sequencer::IndexBatch;
use super::workers::pool::WorkerPool;
use super::workers::{DecodeOutput, DecodeTask, WORKER_POLL_MS};
use super::BatchGenerator;
use crate::dataset::SampleSource;
use crate::sample::SampleHandle;
use crate::transforms::AugmentationPipeline;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Same output as [`BatchAssembler`](super::BatchAssembler), with the per-sample
/// work spread over `config.worker_count()` threads.
///
/// The pool is started by the first batch request and reused by every later one.
/// [`shutdown`](Self::shutdown) (or dropping the assembler) joins the workers; a
/// batch requested after a shutdown starts a fresh pool.
pub struct ParallelBatchAssembler {
    core: BatchCore,
    num_workers: usize,
    pool: Mutex<Option<WorkerPool<DecodeTask>>>,
}

impl ParallelBatchAssembler {
    pub fn new(
        source: impl SampleSource + 'static,
        config: GeneratorConfig,
        pipeline: AugmentationPipeline,
    ) -> Result<Self> {
        Self::from_shared(Arc::new(source), config, Arc::new(pipeline))
    }

    pub fn from_shared(
        source: Arc<dyn SampleSource>,
        config: GeneratorConfig,
        pipeline: Arc<AugmentationPipeline>,
    ) -> Result<Self> {
        let num_workers = config.worker_count();
        Ok(Self {
            core: BatchCore::new(source, config, pipeline)?,
            num_workers,
            pool: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        self.core.config()
    }

    /// Size of the worker pool (whether or not it is running).
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn is_running(&self) -> Result<bool> {
        Ok(self.lock_pool()?.is_some())
    }

    /// Stops and joins the worker threads.
    pub fn shutdown(&self) -> Result<()> {
        let pool = self.lock_pool()?.take();
        if let Some(pool) = pool {
            let workers = pool.num_workers();
            drop(pool);
            if self.config().verbose > 0 {
                tracing::info!(workers, "worker pool shut down");
            }
        }
        Ok(())
    }

    fn lock_pool(&self) -> Result<MutexGuard<'_, Option<WorkerPool<DecodeTask>>>> {
        self.pool
            .lock()
            .map_err(|_| anyhow!("Worker pool lock poisoned by a panicked thread"))
    }

    fn spawn_pool(&self) -> Result<WorkerPool<DecodeTask>> {
        let loader = self.core.loader().clone();
        let pool = WorkerPool::new(
            self.num_workers,
            self.core.config().batch_size.max(self.num_workers),
            move |task_rx: Receiver<DecodeTask>, shutdown: Arc<AtomicBool>| loop {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                match task_rx.recv_timeout(Duration::from_millis(WORKER_POLL_MS)) {
                    Ok(task) => {
                        let sample = loader.load(task.index, task.epoch).with_context(|| {
                            format!("Worker {} failed on sample {}", current_worker_id(), task.index)
                        });
                        // The batch may already have been abandoned; nobody is listening then.
                        let _ = task.reply.send(DecodeOutput {
                            position: task.position,
                            sample,
                        });
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            },
        )?;
        if self.config().verbose > 0 {
            tracing::info!(workers = self.num_workers, "worker pool started");
        }
        Ok(pool)
    }

    /// Assembles the batch for an explicit index batch, without touching the
    /// sequencer. Output is identical to the sequential assembler's.
    pub fn assemble(&self, batch: IndexBatch) -> Result<Batch> {
        let k = batch.len();
        let (reply_tx, reply_rx) = bounded(k);
        {
            let mut pool = self.lock_pool()?;
            if pool.is_none() {
                *pool = Some(self.spawn_pool()?);
            }
            let pool = pool.as_ref().context("Worker pool is not running")?;
            for (position, &index) in batch.indices.iter().enumerate() {
                pool.submit(DecodeTask {
                    position,
                    index,
                    epoch: batch.epoch,
                    reply: reply_tx.clone(),
                })?;
            }
        }
        drop(reply_tx);

        let timeout = self.config().timeout;
        let mut buffer = self.core.buffer(k)?;
        for _ in 0..k {
            let output = reply_rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => anyhow!(
                    "Timed out after {:?} waiting for a worker result (epoch {}, {} samples)",
                    timeout,
                    batch.epoch,
                    k
                ),
                RecvTimeoutError::Disconnected => {
                    anyhow!("Worker threads exited before the batch was complete")
                }
            })?;
            let index = batch.indices[output.position];
            buffer
                .insert(output.position, output.sample?)
                .with_context(|| format!("Failed to stack sample {}", index))?;
        }
        self.core.finish(buffer, batch)
    }
}

impl BatchGenerator for ParallelBatchAssembler {
    fn next_batch(&self) -> Result<Batch> {
        let indices = self.core.next_indices()?;
        self.assemble(indices)
    }

    fn batch_at(&self, offset: usize) -> Result<Batch> {
        let indices = self.core.replay_indices(offset)?;
        self.assemble(indices)
    }

    fn sample_count(&self) -> usize {
        self.core.source().len()
    }

    fn raw_data(&self) -> (Vec<SampleHandle>, Vec<usize>) {
        self.core.raw_data()
    }

    fn labels_at(&self, indices: Option<&[usize]>) -> Result<Vec<usize>> {
        self.core.labels_at(indices)
    }

    fn batches_per_epoch(&self) -> usize {
        self.core.sequencer().batches_per_epoch()
    }

    fn epoch(&self) -> Result<usize> {
        self.core.sequencer().epoch()
    }
}
