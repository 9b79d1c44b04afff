//! Cursor-paginated synchronization of the device inventory

use crate::convert::to_domain;
use crate::pool::{UnitOutcome, WorkerPool};
use device_store::{DeviceService, KvStore};
use mra_client::DeviceSource;
use mra_common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Progress after a page has been fully processed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub processed: u64,
    pub total: u64,
    pub percent: f64,
}

impl Progress {
    pub fn new(processed: u64, total: u64) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 / total as f64 * 100.0
        };
        Self {
            processed,
            total,
            percent,
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Total declared by the probe request
    pub declared_total: u64,
    pub processed: u64,
    pub pages: u64,
    pub parent_links: u64,
}

/// Fetch loop feeding pages through the worker pool into the device service
pub struct SyncPipeline<S> {
    source: Arc<dyn DeviceSource>,
    service: Arc<DeviceService<S>>,
    pool: WorkerPool,
    batch_size: u32,
    cancel: CancellationToken,
}

impl<S: KvStore + 'static> SyncPipeline<S> {
    pub fn new(
        source: Arc<dyn DeviceSource>,
        service: Arc<DeviceService<S>>,
        pool: WorkerPool,
        batch_size: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            service,
            pool,
            batch_size: batch_size.max(1),
            cancel,
        }
    }

    /// Run one full synchronization
    ///
    /// The total is probed once up front. Pages are fetched until that many
    /// devices have been processed, a page comes back empty, or the cursor
    /// stops advancing. Every device of a page is written before the next
    /// page is requested, and the first failed write ends the run.
    pub async fn run<P>(&self, mut on_progress: P) -> Result<SyncReport>
    where
        P: FnMut(Progress),
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let probe = self.source.fetch_page(None, 1).await?;
        let mut report = SyncReport {
            declared_total: probe.count,
            ..SyncReport::default()
        };
        info!("Found {} total devices", report.declared_total);

        let mut cursor: Option<String> = None;
        let mut visited: HashSet<String> = HashSet::new();

        while report.processed < report.declared_total {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let page = self
                .source
                .fetch_page(cursor.as_deref(), self.batch_size)
                .await?;

            let Some(last) = page.devices.last() else {
                info!("Empty page after {} devices, stopping", report.processed);
                break;
            };
            let next_cursor = last.oid.clone();
            let page_len = page.devices.len() as u64;

            let service = Arc::clone(&self.service);
            let tally = self
                .pool
                .run_batch(page.devices, &self.cancel, move |api| {
                    let guid = api.guid.clone();
                    let result = to_domain(api).and_then(|device| service.create(device));
                    match result {
                        Ok(outcome) => Ok(UnitOutcome {
                            parent_linked: outcome.parent_linked,
                        }),
                        Err(e) => {
                            error!("processing device {}: {}", guid, e);
                            Err(e)
                        }
                    }
                })
                .await?;

            report.processed += page_len;
            report.pages += 1;
            report.parent_links += tally.parent_links as u64;
            on_progress(Progress::new(report.processed, report.declared_total));

            if !visited.insert(next_cursor.clone()) {
                warn!(
                    "Cursor {:?} did not advance after page {}, stopping",
                    next_cursor, report.pages
                );
                break;
            }
            cursor = Some(next_cursor);
        }

        info!(
            "Synchronized {}/{} devices in {} pages",
            report.processed, report.declared_total, report.pages
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress::new(2, 4).percent, 50.0);
        assert_eq!(Progress::new(4, 4).percent, 100.0);
        assert_eq!(Progress::new(0, 0).percent, 100.0);
    }
}
