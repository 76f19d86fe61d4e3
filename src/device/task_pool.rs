//! Fixed worker pool with batch wait and cooperative cancellation.

use std::any::Any;
use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::{EmberError, EmberResult};

/// Shared cancel flag of a [`TaskPool`], polled by running jobs.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Return `true` while a cancel is in progress.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, value: bool) {
        self.0.store(value, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the pending count when a job ends, including by panic.
struct PendingGuard(Arc<Pending>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut count = self.0.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.0.drained.notify_all();
        }
    }
}

/// Worker pool executing pushed jobs on a fixed set of rayon threads.
#[derive(Debug)]
pub struct TaskPool {
    pool: rayon::ThreadPool,
    pending: Arc<Pending>,
    cancel: CancelFlag,
    panics: Arc<AtomicUsize>,
}

impl TaskPool {
    /// Build a pool with `threads` workers, or one per logical core.
    pub fn new(threads: Option<usize>) -> EmberResult<Self> {
        if let Some(n) = threads
            && n == 0
        {
            return Err(EmberError::validation(
                "task pool 'threads' must be >= 1 when set",
            ));
        }

        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("ember-worker-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| EmberError::render(format!("failed to build rayon thread pool: {e}")))?;

        Ok(Self {
            pool,
            pending: Arc::new(Pending::default()),
            cancel: CancelFlag::default(),
            panics: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Handle to the cancel flag for jobs to poll.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Enqueue `job` for the next idle worker.
    pub fn push<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.pending.lock() += 1;
        let guard = PendingGuard(Arc::clone(&self.pending));
        let panics = Arc::clone(&self.panics);
        self.pool.spawn(move || {
            let _guard = guard;
            // Counted before the guard releases the pending slot, so `wait_work` observes it.
            if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                panics.fetch_add(1, Ordering::Release);
                tracing::error!(panic = panic_message(payload.as_ref()), "worker job panicked");
            }
        });
    }

    /// Block until every pushed job has finished. Must not be called from a pool job.
    pub fn wait_work(&self) {
        let mut count = self.pending.lock();
        while *count > 0 {
            count = self
                .pending
                .drained
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Raise the cancel flag, wait for in-flight work to drain, then lower it again.
    pub fn cancel(&self) {
        self.cancel.set(true);
        self.wait_work();
        self.cancel.set(false);
    }

    /// Return `true` while a cancel is in progress.
    pub fn canceled(&self) -> bool {
        self.cancel.is_set()
    }

    /// Jobs that ended by panicking since the pool was built.
    pub fn panicked_jobs(&self) -> usize {
        self.panics.load(Ordering::Acquire)
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Partition `0..len` into at most `parts` contiguous ranges whose lengths differ by at most
/// one, using fewer parts when that keeps every range at least `min_chunk` long.
pub fn split_range(len: usize, parts: usize, min_chunk: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let parts = parts.min(len / min_chunk.max(1)).max(1);
    let base = len / parts;
    let extra = len % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let end = start + base + usize::from(i < extra);
            let range = start..end;
            start = end;
            range
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/device/task_pool.rs"]
mod tests;
