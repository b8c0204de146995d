//! Per-item pipeline: page → record → PDF → logs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use harvest_artifacts::{ArtifactStore, StoreOutcome};
use harvest_crawler::{Fetcher, Layout};
use harvest_shared::{HarvestError, Record, Result, WorkItem};
use harvest_storage::PersistenceContext;

use crate::retry::{RetryOutcome, RetryPolicy};

/// Everything a worker needs to process items. Cheap to clone.
#[derive(Clone)]
pub struct ItemContext {
    pub fetcher: Fetcher,
    pub artifacts: ArtifactStore,
    pub sink: Arc<PersistenceContext>,
    pub policy: RetryPolicy,
    pub cancel: CancellationToken,
}

/// Result of one successful pass over an item.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub record: Record,
    pub artifact: StoreOutcome,
}

/// Fetch the item page, extract its record, store the PDF, then persist the record.
///
/// A record is only persisted once its PDF is on disk. Errors are returned
/// as-is for [`RetryPolicy`] to classify.
#[instrument(skip_all, fields(year = item.year, url = %item.item_url))]
pub async fn process_item(ctx: &ItemContext, item: &WorkItem) -> Result<ItemOutcome> {
    let body = ctx.fetcher.fetch(&item.item_url, &ctx.cancel).await?;

    let extractor = Layout::for_year(item.year).extractor();
    let record = extractor.extract(&body, &item.item_url, &item.site_base, item.year)?;
    debug!(extractor = extractor.name(), title = %record.title, "record extracted");

    let artifact_url = Url::parse(&record.artifact_url).map_err(|e| {
        HarvestError::extract(item.item_url.as_str(), format!("bad PDF URL: {e}"))
    })?;
    let artifact = ctx
        .artifacts
        .store(&ctx.fetcher, &artifact_url, &record.artifact_name(), &ctx.cancel)
        .await?;

    ctx.sink.persist(&record).await?;

    Ok(ItemOutcome { record, artifact })
}

/// [`process_item`] under the context's retry policy.
pub async fn process_with_retry(ctx: &ItemContext, item: &WorkItem) -> RetryOutcome<ItemOutcome> {
    ctx.policy
        .run(item.item_url.as_str(), &ctx.cancel, || process_item(ctx, item))
        .await
}
