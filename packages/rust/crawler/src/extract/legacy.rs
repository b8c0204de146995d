//! Extractor for the 1987–2021 paper pages (and the 2021 datasets track).

use harvest_shared::{Record, Result};
use scraper::{Html, Selector};
use url::Url;

use super::{
    Field, Layout, PaperExtractor, abstract_or_sentinel, artifact_url, block_text,
    blocks_after_heading, split_authors, stripped_text, title_or_sentinel,
};

/// Reads the `<h4>`-headed legacy layout.
pub struct LegacyExtractor;

impl PaperExtractor for LegacyExtractor {
    fn extract(&self, body: &str, page_url: &Url, site_base: &Url, year: u16) -> Result<Record> {
        let doc = Html::parse_document(body);

        let h4_sel = Selector::parse("h4").unwrap();
        let title = doc
            .select(&h4_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();

        let artifact_url = artifact_url(
            &doc,
            Layout::Legacy.artifact_suffix(),
            page_url,
            site_base,
        )?;

        let authors = blocks_after_heading(&doc, Field::Authors)
            .first()
            .map(|p| split_authors(&stripped_text(*p)))
            .unwrap_or_default();

        // Some pages put an empty <p> straight after the heading.
        let abstract_blocks = blocks_after_heading(&doc, Field::Abstract);
        let abstract_block = match abstract_blocks.as_slice() {
            [first, rest @ ..] if stripped_text(*first).is_empty() => rest.first().copied(),
            blocks => blocks.first().copied(),
        };

        Ok(Record {
            year,
            title: title_or_sentinel(&title),
            authors,
            abstract_text: abstract_or_sentinel(abstract_block.map(block_text)),
            artifact_url,
            source_url: page_url.to_string(),
        })
    }

    fn name(&self) -> &str {
        "legacy"
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
        Url::parse("https://papers.nips.cc/paper_files/paper/2020/hash/abc123-Abstract.html")
            .unwrap()
    }

    fn site_base() -> Url {
        Url::parse("https://papers.nips.cc").unwrap()
    }

    #[test]
    fn extracts_full_record_from_fixture() {
        let body = load_fixture("legacy_paper.html");
        let record = LegacyExtractor
            .extract(&body, &page_url(), &site_base(), 2020)
            .unwrap();

        assert_eq!(record.year, 2020);
        assert_eq!(record.title, "Deep Sets of Tiny Graphs");
        assert_eq!(record.authors, vec!["Ada Lovelace", "Alan Turing", "Grace Hopper"]);
        assert!(record.abstract_text.starts_with("We study permutation-invariant"));
        assert_eq!(
            record.artifact_url,
            "https://papers.nips.cc/paper_files/paper/2020/file/abc123-Paper.pdf"
        );
        assert_eq!(record.source_url, page_url().to_string());
    }

    #[test]
    fn empty_block_after_abstract_heading_is_skipped() {
        let body = load_fixture("legacy_paper_empty_abstract.html");
        let record = LegacyExtractor
            .extract(&body, &page_url(), &site_base(), 2019)
            .unwrap();

        assert_eq!(
            record.abstract_text,
            "The real abstract lives in the second block."
        );
    }

    #[test]
    fn missing_fields_fall_back_to_sentinels() {
        let body = r#"<html><body>
            <h4>   </h4>
            <a href="/paper_files/paper/1999/file/x-Paper.pdf">Paper</a>
        </body></html>"#;
        let record = LegacyExtractor
            .extract(body, &page_url(), &site_base(), 1999)
            .unwrap();

        assert_eq!(record.title, UNTITLED);
        assert_eq!(record.abstract_text, NO_ABSTRACT);
        assert!(record.authors.is_empty());
    }

    #[test]
    fn page_without_pdf_link_is_missing_artifact() {
        let body = "<html><body><h4>Only a title</h4></body></html>";
        let err = LegacyExtractor
            .extract(body, &page_url(), &site_base(), 2020)
            .unwrap_err();
        assert!(matches!(err, HarvestError::MissingArtifact { .. }));
    }

    #[test]
    fn modern_pdf_suffix_is_not_accepted() {
        let body = r#"<h4>T</h4><a href="/file/x-Paper-Conference.pdf">Paper</a>"#;
        let err = LegacyExtractor
            .extract(body, &page_url(), &site_base(), 2020)
            .unwrap_err();
        assert!(err.is_soft());
    }
}
