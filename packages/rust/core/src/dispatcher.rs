//! Run-level orchestration: enumerate years, queue paper pages, drain with a worker pool.
//!
//! Submission and execution overlap. The scheduler pushes [`WorkItem`]s into
//! a bounded channel while `concurrency` workers pull from it, so a full
//! queue makes the scheduler wait rather than buffer the whole site.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use harvest_artifacts::ArtifactStore;
use harvest_crawler::{Fetcher, Layout};
use harvest_discovery::{discover_items, discover_years};
use harvest_shared::{HarvestConfig, Result, WorkItem, YearSelection};
use harvest_storage::PersistenceContext;

use crate::pipeline::{ItemContext, process_with_retry};
use crate::retry::{RetryOutcome, RetryPolicy};

/// Year whose datasets-and-benchmarks track lives on a separate site.
pub const DATASETS_YEAR: u16 = 2021;

/// Lifecycle of one [`Dispatcher::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchPhase {
    #[default]
    Idle,
    Enumerating,
    Scheduling,
    Draining,
    Done,
}

impl DispatchPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Enumerating => "Discovering years",
            Self::Scheduling => "Scheduling papers",
            Self::Draining => "Finishing downloads",
            Self::Done => "Done",
        }
    }
}

/// Terminal state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Persisted,
    Skipped,
    Abandoned,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    /// Selected years whose index was fetched and queued.
    pub years_scheduled: usize,
    /// Selected years whose index could not be fetched.
    pub years_skipped: usize,
    pub items_submitted: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub abandoned: usize,
    pub duration: Duration,
}

/// Progress callback for reporting dispatcher status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, phase: DispatchPhase);
    /// Called when an item is accepted by the queue.
    fn item_queued(&self, item: &WorkItem);
    /// Called by a worker once an item reaches a terminal state.
    fn item_finished(&self, item: &WorkItem, status: ItemStatus);
    /// Called when the run completes.
    fn done(&self, summary: &HarvestSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: DispatchPhase) {}
    fn item_queued(&self, _item: &WorkItem) {}
    fn item_finished(&self, _item: &WorkItem, _status: ItemStatus) {}
    fn done(&self, _summary: &HarvestSummary) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerTally {
    persisted: usize,
    skipped: usize,
    abandoned: usize,
}

impl WorkerTally {
    fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Persisted => self.persisted += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Abandoned => self.abandoned += 1,
        }
    }
}

/// Owns the shared session, sinks and limits for harvest runs.
pub struct Dispatcher {
    config: HarvestConfig,
    ctx: ItemContext,
}

impl Dispatcher {
    /// Build the shared HTTP session and sinks under `config.output_dir`.
    pub fn new(config: HarvestConfig, cancel: CancellationToken) -> Result<Self> {
        config.validate()?;

        let ctx = ItemContext {
            fetcher: Fetcher::new(config.timeout)?,
            artifacts: ArtifactStore::new(config.output_dir.join("artifacts"), config.chunk_size),
            sink: Arc::new(PersistenceContext::new(&config.output_dir)),
            policy: RetryPolicy::new(config.max_attempts, config.backoff_base),
            cancel,
        };

        Ok(Self { config, ctx })
    }

    /// Harvest every paper of the selected years.
    ///
    /// Only a failure to read the proceedings root is returned as an error;
    /// per-year and per-item failures are logged and counted.
    #[instrument(skip_all, fields(root = %self.config.base_url, years = years.len()))]
    pub async fn run(
        &self,
        years: &YearSelection,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<HarvestSummary> {
        let start = Instant::now();
        let cancel = &self.ctx.cancel;

        // --- Enumerating ---
        progress.phase(DispatchPhase::Enumerating);
        let year_links = discover_years(&self.ctx.fetcher, &self.config.base_url, cancel).await?;
        for year in years.iter() {
            if !year_links.iter().any(|l| l.year == year) {
                warn!(year, "selected year is not listed on the proceedings root");
            }
        }

        // --- Scheduling ---
        progress.phase(DispatchPhase::Scheduling);
        let (tx, rx) = mpsc::channel::<WorkItem>(self.config.queue_capacity);
        let queue = Arc::new(Mutex::new(rx));

        let workers: Vec<JoinHandle<WorkerTally>> = (0..self.config.concurrency)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    self.ctx.clone(),
                    Arc::clone(&queue),
                    Arc::clone(&progress),
                ))
            })
            .collect();
        drop(queue);

        let datasets = years.contains(DATASETS_YEAR).then(|| {
            tokio::spawn(enumerate_datasets(
                self.ctx.fetcher.clone(),
                self.config.datasets_url.clone(),
                tx.clone(),
                cancel.clone(),
                Arc::clone(&progress),
            ))
        });

        let mut summary = HarvestSummary::default();

        'years: for link in &year_links {
            if !years.contains(link.year) {
                debug!(year = link.year, "skipping year (not selected)");
                continue;
            }
            if cancel.is_cancelled() {
                break;
            }

            info!(year = link.year, "processing year");
            let layout = Layout::for_year(link.year);
            let items = match discover_items(&self.ctx.fetcher, &link.url, layout, cancel).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(
                        year = link.year,
                        url = %link.url,
                        error = %e,
                        "year index failed, skipping year"
                    );
                    summary.years_skipped += 1;
                    continue;
                }
            };
            summary.years_scheduled += 1;

            for item_url in items {
                let item = WorkItem {
                    year: link.year,
                    item_url,
                    site_base: self.config.base_url.clone(),
                };
                if !submit(&tx, item, cancel, progress.as_ref()).await {
                    break 'years;
                }
                summary.items_submitted += 1;
            }
        }

        if let Some(handle) = datasets {
            match handle.await {
                Ok(submitted) => summary.items_submitted += submitted,
                Err(e) => warn!(error = %e, "datasets enumeration task failed"),
            }
        }
        drop(tx);

        // --- Draining ---
        progress.phase(DispatchPhase::Draining);
        for handle in workers {
            match handle.await {
                Ok(tally) => {
                    summary.persisted += tally.persisted;
                    summary.skipped += tally.skipped;
                    summary.abandoned += tally.abandoned;
                }
                Err(e) => warn!(error = %e, "worker task failed"),
            }
        }

        summary.duration = start.elapsed();
        progress.phase(DispatchPhase::Done);
        progress.done(&summary);

        info!(
            years_scheduled = summary.years_scheduled,
            years_skipped = summary.years_skipped,
            submitted = summary.items_submitted,
            persisted = summary.persisted,
            skipped = summary.skipped,
            abandoned = summary.abandoned,
            elapsed_ms = summary.duration.as_millis() as u64,
            "harvest complete"
        );

        Ok(summary)
    }
}

/// Push `item` into the queue, waiting while it is full.
///
/// Returns `false` once the run is cancelled or every worker has gone.
async fn submit(
    tx: &mpsc::Sender<WorkItem>,
    item: WorkItem,
    cancel: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> bool {
    progress.item_queued(&item);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

/// Queue the 2021 datasets-and-benchmarks papers. Returns how many were queued.
async fn enumerate_datasets(
    fetcher: Fetcher,
    root: Url,
    tx: mpsc::Sender<WorkItem>,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressReporter>,
) -> usize {
    let items = match discover_items(&fetcher, &root, Layout::Legacy, &cancel).await {
        Ok(items) => items,
        Err(e) => {
            warn!(url = %root, error = %e, "error processing datasets and benchmarks papers");
            return 0;
        }
    };

    let mut submitted = 0;
    for item_url in items {
        let item = WorkItem {
            year: DATASETS_YEAR,
            item_url,
            site_base: root.clone(),
        };
        if !submit(&tx, item, &cancel, progress.as_ref()).await {
            break;
        }
        submitted += 1;
    }

    info!(submitted, "datasets and benchmarks papers queued");
    submitted
}

/// Pull items until the queue closes or the run is cancelled.
async fn worker(
    id: usize,
    ctx: ItemContext,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    progress: Arc<dyn ProgressReporter>,
) -> WorkerTally {
    let mut tally = WorkerTally::default();

    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                item = rx.recv() => item,
            }
        };
        let Some(item) = next else { break };

        let status = match process_with_retry(&ctx, &item).await {
            RetryOutcome::Succeeded { value, attempts } => {
                debug!(worker = id, title = %value.record.title, attempts, "item persisted");
                ItemStatus::Persisted
            }
            RetryOutcome::Skipped { .. } => ItemStatus::Skipped,
            RetryOutcome::GaveUp { .. } => ItemStatus::Abandoned,
        };
        tally.record(status);
        progress.item_finished(&item, status);
    }

    debug!(worker = id, ?tally, "worker finished");
    tally
}
