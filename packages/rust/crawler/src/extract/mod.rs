//! Paper-page extractors, one per proceedings page layout.
//!
//! The site changed its markup for the 2022 proceedings. [`Layout::for_year`]
//! picks the variant; each variant implements [`PaperExtractor`].

mod legacy;
mod modern;

use std::sync::LazyLock;

use harvest_shared::{HarvestError, NO_ABSTRACT, Result, UNTITLED};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub use legacy::LegacyExtractor;
pub use modern::ModernExtractor;

/// Last year published with the legacy layout.
pub const LAST_LEGACY_YEAR: u16 = 2021;

static AUTHORS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*authors\s*:?\s*$").expect("static pattern"));
static ABSTRACT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*abstract\s*:?\s*$").expect("static pattern"));

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Turns a paper page into a [`harvest_shared::Record`].
pub trait PaperExtractor: Send + Sync {
    /// Extract a record from `body`, the HTML served for `page_url`.
    ///
    /// PDF links resolve against `site_base`. A page without a PDF link
    /// yields [`HarvestError::MissingArtifact`].
    fn extract(
        &self,
        body: &str,
        page_url: &Url,
        site_base: &Url,
        year: u16,
    ) -> Result<harvest_shared::Record>;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Layout selection
// ---------------------------------------------------------------------------

/// Page layout of a proceedings year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// 1987–2021.
    Legacy,
    /// 2022 onwards.
    Modern,
}

impl Layout {
    /// Layout used by the proceedings of `year`.
    pub fn for_year(year: u16) -> Self {
        if year > LAST_LEGACY_YEAR {
            Self::Modern
        } else {
            Self::Legacy
        }
    }

    /// The extractor that understands this layout.
    pub fn extractor(self) -> &'static dyn PaperExtractor {
        match self {
            Self::Legacy => &LegacyExtractor,
            Self::Modern => &ModernExtractor,
        }
    }

    /// Suffix of paper-page links on a year index.
    pub fn item_link_suffix(self) -> &'static str {
        match self {
            Self::Legacy => "Abstract.html",
            Self::Modern => "Abstract-Conference.html",
        }
    }

    /// Suffix of the PDF link on a paper page.
    pub fn artifact_suffix(self) -> &'static str {
        match self {
            Self::Legacy => "Paper.pdf",
            Self::Modern => "Paper-Conference.pdf",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Modern => "modern",
        }
    }
}

// ---------------------------------------------------------------------------
// Markup helpers shared by both layouts
// ---------------------------------------------------------------------------

/// Which side of a label heading to read.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Field {
    Authors,
    Abstract,
}

impl Field {
    fn label(self) -> &'static Regex {
        match self {
            Self::Authors => &*AUTHORS_LABEL,
            Self::Abstract => &*ABSTRACT_LABEL,
        }
    }
}

/// The `<p>` blocks that follow the first `<h4>` labelled with `field`,
/// in document order.
pub(crate) fn blocks_after_heading(doc: &Html, field: Field) -> Vec<ElementRef<'_>> {
    let sel = Selector::parse("h4, p").unwrap();
    let label = field.label();

    doc.select(&sel)
        .skip_while(|el| {
            !(el.value().name() == "h4" && label.is_match(&el.text().collect::<String>()))
        })
        .skip(1)
        .filter(|el| el.value().name() == "p")
        .collect()
}

/// Text nodes each trimmed, empties dropped, concatenated without a separator.
pub(crate) fn stripped_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}

/// Text nodes concatenated with `sep` between them.
pub(crate) fn joined_text(el: ElementRef<'_>, sep: &str) -> String {
    el.text().collect::<Vec<_>>().join(sep)
}

/// Whitespace-normalised full text of an element.
pub(crate) fn block_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a comma-separated author line, trimming and dropping empty tokens.
pub(crate) fn split_authors(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

/// Absolute URL of the first link whose href ends with `suffix`.
pub(crate) fn artifact_url(
    doc: &Html,
    suffix: &str,
    page_url: &Url,
    site_base: &Url,
) -> Result<String> {
    let sel = Selector::parse("a[href]").unwrap();
    let href = doc
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .find(|href| href.ends_with(suffix))
        .ok_or_else(|| HarvestError::MissingArtifact {
            url: page_url.to_string(),
        })?;

    site_base
        .join(href)
        .map(String::from)
        .map_err(|e| {
            HarvestError::extract(page_url.as_str(), format!("bad PDF href '{href}': {e}"))
        })
}

pub(crate) fn title_or_sentinel(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title.to_string()
    }
}

pub(crate) fn abstract_or_sentinel(text: Option<String>) -> String {
    match text {
        Some(t) if !t.is_empty() => t,
        _ => NO_ABSTRACT.to_string(),
    }
}
