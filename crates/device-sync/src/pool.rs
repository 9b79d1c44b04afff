//! Bounded worker pool for per-device work
//!
//! A batch fans out onto the blocking thread pool with at most `workers`
//! units in flight, then joins every started unit before returning.

use mra_common::{Error, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What one unit of work reports back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitOutcome {
    pub parent_linked: bool,
}

/// Per-batch totals, merged from unit outcomes at the join barrier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub completed: usize,
    pub parent_links: usize,
}

impl BatchTally {
    fn record(&mut self, outcome: UnitOutcome) {
        self.completed += 1;
        if outcome.parent_linked {
            self.parent_links += 1;
        }
    }
}

pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `work` over `items`, at most `workers` at a time
    ///
    /// Once a unit fails no further units are started; units already running
    /// are joined and the first error other than [`Error::Cancelled`] is
    /// returned. Cancelling
    /// `cancel` stops dispatch and units that have not begun return
    /// [`Error::Cancelled`].
    pub async fn run_batch<T, F>(
        &self,
        items: Vec<T>,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<BatchTally>
    where
        T: Send + 'static,
        F: Fn(T) -> Result<UnitOutcome> + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        // cancelled by the first failing unit, or with the caller's token
        let abort = cancel.child_token();
        let mut units = JoinSet::new();

        for item in items {
            if abort.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
                _ = abort.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => permit
                    .map_err(|e| Error::from(anyhow::anyhow!("worker pool closed: {}", e)))?,
            };

            if abort.is_cancelled() {
                break;
            }

            let work = Arc::clone(&work);
            let abort = abort.clone();
            units.spawn_blocking(move || {
                let _permit = permit;
                if abort.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                let result = work(item);
                if result.is_err() {
                    abort.cancel();
                }
                result
            });
        }

        let mut tally = BatchTally::default();
        let mut first_error = None;
        while let Some(joined) = units.join_next().await {
            let result = joined
                .map_err(|e| Error::from(anyhow::anyhow!("worker task failed: {}", e)))
                .and_then(|r| r);

            match result {
                Ok(outcome) => tally.record(outcome),
                // queued units see the abort as Cancelled; keep the real cause
                Err(e) => {
                    if matches!(first_error, None | Some(Error::Cancelled)) {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!(
            "Batch complete: {} units, {} parent links",
            tally.completed, tally.parent_links
        );
        Ok(tally)
    }
}
