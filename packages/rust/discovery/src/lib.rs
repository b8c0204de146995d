//! Work discovery: proceedings root → year indexes → paper pages.
//!
//! Before any paper is processed the harvester fetches the proceedings root,
//! picks out one link per year, and for each selected year lists the paper
//! pages matching that year's layout.

mod parser;

use harvest_crawler::{Fetcher, Layout};
use harvest_shared::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

pub use parser::{YEAR_PATH_PREFIX, YearLink, parse_item_links, parse_year_links};

/// Fetch the proceedings root and list its year index links.
#[instrument(skip_all, fields(root = %root))]
pub async fn discover_years(
    fetcher: &Fetcher,
    root: &Url,
    cancel: &CancellationToken,
) -> Result<Vec<YearLink>> {
    let body = fetcher.fetch(root, cancel).await?;
    let links = parse_year_links(&body, root);
    info!(years = links.len(), "year indexes discovered");
    Ok(links)
}

/// Fetch one index page and list the paper pages it links for `layout`.
#[instrument(skip_all, fields(index = %index_url, layout = layout.name()))]
pub async fn discover_items(
    fetcher: &Fetcher,
    index_url: &Url,
    layout: Layout,
    cancel: &CancellationToken,
) -> Result<Vec<Url>> {
    let body = fetcher.fetch(index_url, cancel).await?;
    let items = parse_item_links(&body, index_url, layout);
    info!(items = items.len(), "paper pages discovered");
    Ok(items)
}
