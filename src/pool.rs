//! Bounded worker pool shared by the block writer and reader.
//!
//! A rayon thread pool executes the jobs; a bounded crossbeam channel plays
//! the role of a counting semaphore so that submission blocks once
//! `queue_size + workers` jobs are in flight. A shared cancellation flag
//! lets any failing block drain the remaining work cheaply: jobs observe it
//! before starting and bail out instead of computing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};

type JobFn = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    pending: usize,
}

/// Fixed-size worker pool with bounded submission and cooperative
/// cancellation.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    state: Arc<(Mutex<PoolState>, Condvar)>,
    cancelled: Arc<AtomicBool>,
}

impl WorkerPool {
    /// `workers` must be at least 1; the queue admits `queue_size` jobs
    /// beyond the ones actively running.
    pub fn new(workers: usize, queue_size: usize) -> Result<WorkerPool> {
        if workers < 1 || queue_size < 1 {
            return Err(Error::invalid_param("pool needs at least one worker and one slot"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::invalid_param(format!("cannot build thread pool: {e}")))?;
        let capacity = queue_size + workers;
        let (slot_tx, slot_rx) = bounded(capacity);
        for _ in 0..capacity {
            slot_tx
                .send(())
                .map_err(|_| Error::invalid_param("pool slot channel closed"))?;
        }
        Ok(WorkerPool {
            pool,
            slot_tx,
            slot_rx,
            state: Arc::new((Mutex::new(PoolState { pending: 0 }), Condvar::new())),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared cancellation flag; cloned into jobs so they can observe a
    /// failure elsewhere before doing their own work.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Submit a job; blocks while the queue is full.
    pub fn submit(&self, job: JobFn) {
        self.slot_rx.recv().expect("pool slot channel closed");
        {
            let (lock, _cvar) = &*self.state;
            lock.lock().unwrap().pending += 1;
        }
        let state = Arc::clone(&self.state);
        let slot_tx = self.slot_tx.clone();
        self.pool.spawn(move || {
            job();
            let (lock, cvar) = &*state;
            let mut s = lock.lock().unwrap();
            s.pending -= 1;
            if s.pending == 0 {
                cvar.notify_all();
            }
            drop(s);
            let _ = slot_tx.send(());
        });
    }

    /// Block until every submitted job has finished. The pool stays usable.
    pub fn drain(&self) {
        let (lock, cvar) = &*self.state;
        let mut s = lock.lock().unwrap();
        while s.pending > 0 {
            s = cvar.wait(s).unwrap();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_all_jobs() {
        let pool = WorkerPool::new(4, 8).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let c = Arc::clone(&counter);
            pool.submit(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn cancellation_is_visible_to_jobs() {
        let pool = WorkerPool::new(2, 4).unwrap();
        let flag = pool.cancel_flag();
        let skipped = Arc::new(AtomicUsize::new(0));
        pool.cancel();
        for _ in 0..10 {
            let f = Arc::clone(&flag);
            let s = Arc::clone(&skipped);
            pool.submit(Box::new(move || {
                if f.load(Ordering::SeqCst) {
                    s.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        pool.drain();
        assert_eq!(skipped.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(WorkerPool::new(0, 1).is_err());
        assert!(WorkerPool::new(1, 0).is_err());
    }
}
