// SPDX-License-Identifier: MIT

//! Fixed-size worker pool over a bounded queue
//!
//! Submission never blocks: `try_submit` returns false when the queue is
//! at capacity and the caller applies backpressure upstream. Shutdown
//! closes the queue and waits for every worker, so queued work drains
//! before the pool is gone.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

pub(crate) struct WorkerPool<T> {
    tx: mpsc::Sender<T>,
    queued: Arc<AtomicUsize>,
    capacity: usize,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Start `workers` tasks consuming a queue of the given capacity, each
    /// job handled by `handler`.
    pub fn new<F, Fut>(workers: usize, capacity: usize, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);
        let queued = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            let handler = handler.clone();
            let queued = queued.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    // The receiver lock is held only for the dequeue, never
                    // across handler awaits.
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => {
                            queued.fetch_sub(1, Ordering::AcqRel);
                            handler(job).await;
                        }
                        None => break,
                    }
                }
            }));
        }

        Self {
            tx,
            queued,
            capacity,
            workers: handles,
        }
    }

    /// Attempt to enqueue without blocking. False means the queue is full.
    pub fn try_submit(&self, job: T) -> bool {
        // Count before sending so a fast worker cannot decrement first.
        self.queued.fetch_add(1, Ordering::AcqRel);
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(_) => {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                false
            }
        }
    }

    /// Jobs currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Queue used / capacity, in [0, 1].
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.len() as f64 / self.capacity as f64
    }

    /// Close the queue and wait for all workers to finish the remaining
    /// jobs.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[tokio::test]
    async fn test_jobs_are_processed() {
        let processed = Arc::new(AtomicU64::new(0));
        let counter = processed.clone();
        let pool = WorkerPool::new(4, 16, move |_job: u32| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        for i in 0..10 {
            assert!(pool.try_submit(i));
        }
        pool.shutdown().await;
        assert_eq!(processed.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        // Single-threaded test runtime: with no await between submissions
        // the worker never runs, so the queue fills deterministically.
        let release = Arc::new(Semaphore::new(0));
        let gate = release.clone();
        let pool = WorkerPool::new(1, 2, move |_job: u32| {
            let gate = gate.clone();
            async move {
                let _permit = gate.acquire().await;
            }
        });

        assert!(pool.try_submit(1));
        assert!(pool.try_submit(2));
        assert!(!pool.try_submit(3));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.utilization(), 1.0);

        release.add_permits(1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_jobs() {
        let processed = Arc::new(AtomicU64::new(0));
        let counter = processed.clone();
        let pool = WorkerPool::new(1, 8, move |_job: u32| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        for i in 0..5 {
            assert!(pool.try_submit(i));
        }
        pool.shutdown().await;
        assert_eq!(processed.load(Ordering::SeqCst), 5);
    }
}
