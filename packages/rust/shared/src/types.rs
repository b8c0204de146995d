//! Core domain types for a harvest run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};

/// First proceedings year the site publishes.
pub const START_YEAR: u16 = 1987;

/// Last proceedings year the extractors know how to read.
pub const END_YEAR: u16 = 2023;

/// Upper bound on the number of years harvested in one run.
pub const MAX_SELECTED_YEARS: usize = 5;

/// Title used when an item page has no usable title.
pub const UNTITLED: &str = "Untitled";

/// Abstract used when an item page has no usable abstract.
pub const NO_ABSTRACT: &str = "No abstract available";

// ---------------------------------------------------------------------------
// YearSelection
// ---------------------------------------------------------------------------

/// A validated, de-duplicated set of proceedings years (1 to 5 entries,
/// each within [`START_YEAR`]..=[`END_YEAR`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSelection(BTreeSet<u16>);

impl YearSelection {
    /// Validate `years` into a selection.
    pub fn new(years: impl IntoIterator<Item = u16>) -> Result<Self> {
        let set: BTreeSet<u16> = years.into_iter().collect();

        if set.is_empty() {
            return Err(HarvestError::validation("select at least one year"));
        }
        if set.len() > MAX_SELECTED_YEARS {
            return Err(HarvestError::validation(format!(
                "you can only select up to {MAX_SELECTED_YEARS} years at a time (got {})",
                set.len()
            )));
        }

        let out_of_range: Vec<u16> = set
            .iter()
            .copied()
            .filter(|y| !(START_YEAR..=END_YEAR).contains(y))
            .collect();
        if !out_of_range.is_empty() {
            return Err(HarvestError::validation(format!(
                "years out of range {START_YEAR}-{END_YEAR}: {out_of_range:?}"
            )));
        }

        Ok(Self(set))
    }

    /// Whether `year` is part of the selection.
    pub fn contains(&self, year: u16) -> bool {
        self.0.contains(&year)
    }

    /// Selected years in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// One paper detail page waiting to be harvested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Proceedings year the page belongs to.
    pub year: u16,
    /// Absolute URL of the paper's abstract page.
    pub item_url: Url,
    /// Root of the collection the page was listed under; PDF links resolve against it.
    pub site_base: Url,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Metadata harvested for a single paper.
///
/// Serialized with the field names used by the JSON and CSV logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub year: u16,
    /// Never empty; falls back to [`UNTITLED`].
    pub title: String,
    /// In page order; may be empty.
    pub authors: Vec<String>,
    /// Never empty; falls back to [`NO_ABSTRACT`].
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Absolute PDF URL.
    #[serde(rename = "pdf_url")]
    pub artifact_url: String,
    /// The abstract page the record was extracted from.
    #[serde(rename = "paper_url")]
    pub source_url: String,
}

impl Record {
    /// Name hint for the artifact file: `{year}_{title}`.
    pub fn artifact_name(&self) -> String {
        format!("{}_{}", self.year, self.title)
    }
}
