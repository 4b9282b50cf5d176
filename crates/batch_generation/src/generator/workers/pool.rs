//! Worker pool implementation for parallel sample decoding.
//!
//! Provides a reusable thread pool that manages worker lifecycle and task
//! distribution. Results do not flow back through the pool: each task carries its
//! own reply channel, so concurrent batches never see each other's outputs.
//!
//! # Key features
//! - Bounded task channel prevents unbounded queue growth
//! - Graceful shutdown on drop
//! - Thread-local worker IDs for debugging

use anyhow::{ensure, Context, Result};
use crossbeam_channel::{bounded, Receiver, SendError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::generator::common::thread::WORKER_ID;

/// Thread pool pulling tasks from one shared queue.
///
/// - Task channel: caller -> workers (work distribution)
/// - Shutdown flag: enables graceful termination
pub(crate) struct WorkerPool<Task> {
    workers: Vec<thread::JoinHandle<()>>,
    task_tx: Option<Sender<Task>>,
    shutdown: Arc<AtomicBool>,
}

impl<Task> WorkerPool<Task>
where
    Task: Send + 'static,
{
    /// Spawns `num_workers` threads running `worker_fn` against the shared queue.
    pub(crate) fn new<F>(num_workers: usize, buffer_size: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        ensure!(
            num_workers > 0,
            "Cannot create WorkerPool with 0 workers. Use the sequential assembler instead."
        );
        ensure!(
            buffer_size > 0,
            "Cannot create WorkerPool with buffer_size 0. Buffer size must be > 0 to prevent deadlocks."
        );

        let (task_tx, task_rx) = bounded(buffer_size);
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut pool = Self {
            workers: Vec::with_capacity(num_workers),
            task_tx: Some(task_tx),
            shutdown,
        };

        for worker_id in 0..num_workers {
            let task_rx = task_rx.clone();
            let shutdown = pool.shutdown.clone();
            let worker_fn = worker_fn.clone();

            // A failed spawn drops `pool`, which joins the workers started so far.
            let handle = thread::Builder::new()
                .name(format!("batch-worker-{}", worker_id))
                .spawn(move || {
                    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
                    worker_fn(task_rx, shutdown);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;
            pool.workers.push(handle);
        }
        Ok(pool)
    }

    /// Queues a task, blocking while the queue is full.
    pub(crate) fn submit(&self, task: Task) -> Result<()> {
        let tx = self
            .task_tx
            .as_ref()
            .context("Worker pool has been shut down")?;
        tx.send(task)
            .map_err(|SendError(_)| anyhow::anyhow!("All worker threads have exited"))
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.workers.len()
    }
}

impl<Task> Drop for WorkerPool<Task> {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown.store(true, Ordering::Relaxed);

        // Drop the task sender to close the channel
        self.task_tx.take();

        // Wait for workers to finish
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::RecvTimeoutError;
    use std::time::Duration;

    type Echo = (usize, Sender<(usize, usize)>);

    fn echo_pool(num_workers: usize) -> Result<WorkerPool<Echo>> {
        WorkerPool::new(num_workers, 4, |rx: Receiver<Echo>, shutdown| loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            match rx.recv_timeout(Duration::from_millis(10)) {
                Ok((value, reply)) => {
                    let worker = WORKER_ID.with(|id| *id.borrow());
                    let _ = reply.send((value * 2, worker));
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        })
    }

    #[test]
    fn test_pool_processes_every_task() -> Result<()> {
        let pool = echo_pool(3)?;
        assert_eq!(pool.num_workers(), 3);

        let (tx, rx) = bounded(10);
        for value in 0..10 {
            pool.submit((value, tx.clone()))?;
        }
        let mut doubled: Vec<usize> = (0..10).map(|_| rx.recv().unwrap().0).collect();
        doubled.sort();
        assert_eq!(doubled, (0..10).map(|v| v * 2).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_pool_rejects_zero_workers() {
        assert!(echo_pool(0).is_err());
    }

    #[test]
    fn test_drop_joins_workers() -> Result<()> {
        let pool = echo_pool(2)?;
        drop(pool);
        Ok(())
    }
}
