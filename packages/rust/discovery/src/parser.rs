//! Link selection on the proceedings root and on per-year index pages.

use std::collections::HashSet;

use harvest_crawler::Layout;
use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

/// Path prefix shared by every year index link on the proceedings root.
pub const YEAR_PATH_PREFIX: &str = "/paper_files/paper/";

/// A year index discovered on the proceedings root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearLink {
    pub year: u16,
    pub url: Url,
}

/// Year index links on the proceedings root, resolved against `root`.
///
/// Links whose last path segment is not a year are dropped with a warning.
pub fn parse_year_links(html: &str, root: &Url) -> Vec<YearLink> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(&format!(r#"a[href^="{YEAR_PATH_PREFIX}"]"#)).unwrap();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in doc.select(&sel).filter_map(|el| el.value().attr("href")) {
        let Ok(url) = root.join(href) else {
            warn!(href, "skipping unresolvable year link");
            continue;
        };

        match year_from_url(&url) {
            Some(year) => {
                if seen.insert(year) {
                    links.push(YearLink { year, url });
                }
            }
            None => warn!(%url, "skipping invalid year URL"),
        }
    }

    links
}

/// Paper-page links on a year index for the given layout, resolved against `page_url`.
///
/// Order is preserved; repeated links are kept once.
pub fn parse_item_links(html: &str, page_url: &Url, layout: Layout) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(&format!(r#"a[href$="{}"]"#, layout.item_link_suffix())).unwrap();

    let mut seen = HashSet::new();
    doc.select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Parse the final non-empty path segment as a year.
fn year_from_url(url: &Url) -> Option<u16> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?
        .parse()
        .ok()
}
