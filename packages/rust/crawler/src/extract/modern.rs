//! Extractor for the 2022+ paper pages.

use harvest_shared::{Record, Result};
use scraper::{Html, Selector};
use url::Url;

use super::{
    Field, Layout, PaperExtractor, abstract_or_sentinel, artifact_url, block_text,
    blocks_after_heading, joined_text, split_authors, title_or_sentinel,
};

/// Suffix the site appends to every `<title>`.
const TITLE_SUFFIX: &str = " - NeurIPS";

/// Reads the conference layout introduced in 2022.
pub struct ModernExtractor;

impl PaperExtractor for ModernExtractor {
    fn extract(&self, body: &str, page_url: &Url, site_base: &Url, year: u16) -> Result<Record> {
        let doc = Html::parse_document(body);

        let title_sel = Selector::parse("title").unwrap();
        let title = doc
            .select(&title_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().replace(TITLE_SUFFIX, ""))
            .unwrap_or_default();

        // Author names sit in separate inline elements; join text nodes with commas.
        let authors = blocks_after_heading(&doc, Field::Authors)
            .first()
            .map(|p| split_authors(&joined_text(*p, ",")))
            .unwrap_or_default();

        let abstract_text = blocks_after_heading(&doc, Field::Abstract)
            .first()
            .map(|p| block_text(*p));

        let artifact_url = artifact_url(
            &doc,
            Layout::Modern.artifact_suffix(),
            page_url,
            site_base,
        )?;

        Ok(Record {
            year,
            title: title_or_sentinel(&title),
            authors,
            abstract_text: abstract_or_sentinel(abstract_text),
            artifact_url,
            source_url: page_url.to_string(),
        })
    }

    fn name(&self) -> &str {
        "modern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_shared::{HarvestError, NO_ABSTRACT, UNTITLED};

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn page_url() -> Url {
        Url::parse(
            "https://papers.nips.cc/paper_files/paper/2022/hash/def456-Abstract-Conference.html",
        )
        .unwrap()
    }

    fn site_base() -> Url {
        Url::parse("https://papers.nips.cc").unwrap()
    }

    #[test]
    fn extracts_full_record_from_fixture() {
        let body = load_fixture("modern_paper.html");
        let record = ModernExtractor
            .extract(&body, &page_url(), &site_base(), 2022)
            .unwrap();

        assert_eq!(record.title, "Scaling Laws for Sparse Mixtures");
        assert_eq!(
            record.authors,
            vec!["Katherine Johnson", "Dorothy Vaughan", "Mary Jackson"]
        );
        assert_eq!(
            record.abstract_text,
            "We fit scaling laws to sparse mixture-of-experts models across three orders of magnitude."
        );
        assert_eq!(
            record.artifact_url,
            "https://papers.nips.cc/paper_files/paper/2022/file/def456-Paper-Conference.pdf"
        );
    }

    #[test]
    fn blank_title_falls_back_to_untitled() {
        let body = r#"<html><head><title>   </title></head><body>
            <a href="/file/x-Paper-Conference.pdf">Paper</a>
        </body></html>"#;
        let record = ModernExtractor
            .extract(body, &page_url(), &site_base(), 2023)
            .unwrap();

        assert_eq!(record.title, UNTITLED);
        assert_eq!(record.abstract_text, NO_ABSTRACT);
        assert!(record.authors.is_empty());
    }

    #[test]
    fn legacy_pdf_suffix_is_not_accepted() {
        let body = r#"<title>T - NeurIPS</title><a href="/file/x-Paper.pdf">Paper</a>"#;
        let err = ModernExtractor
            .extract(body, &page_url(), &site_base(), 2022)
            .unwrap_err();
        assert!(matches!(err, HarvestError::MissingArtifact { .. }));
    }
}
