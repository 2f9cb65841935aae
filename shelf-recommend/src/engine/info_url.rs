//! Info URL derivation for matched candidates
//!
//! Order: provider deep link stored in metadata, canonical Google Books link,
//! canonical Open Library work link, generic web search for title and author.

use crate::types::{non_empty, BookSource, CatalogRecord};
use reqwest::Url;

/// Metadata keys holding a provider deep link
const DEEP_LINK_KEYS: &[&str] = &["infoLink", "info_url"];

const GOOGLE_BOOKS_URL: &str = "https://books.google.com/books";
const OPEN_LIBRARY_WORKS_URL: &str = "https://openlibrary.org/works/";
const WEB_SEARCH_URL: &str = "https://www.google.com/search";

pub fn info_url(record: &CatalogRecord) -> String {
    if let Some(link) = DEEP_LINK_KEYS.iter().find_map(|key| record.metadata_str(key)) {
        return link.to_string();
    }

    let source_id = non_empty(record.source_id.as_deref());
    match (record.source, source_id) {
        (BookSource::Google, Some(id)) => with_query(GOOGLE_BOOKS_URL, &[("id", id)]),
        (BookSource::OpenLibrary, Some(id)) => open_library_work(id),
        _ => {
            let terms = match record.first_author() {
                Some(author) => format!("{} {}", record.title, author),
                None => record.title.clone(),
            };
            with_query(WEB_SEARCH_URL, &[("q", terms.as_str())])
        }
    }
}

fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    match Url::parse_with_params(base, params) {
        Ok(url) => url.to_string(),
        Err(_) => base.to_string(),
    }
}

fn open_library_work(id: &str) -> String {
    let id = id.trim_start_matches("/works/");
    let Ok(mut url) = Url::parse(OPEN_LIBRARY_WORKS_URL) else {
        return OPEN_LIBRARY_WORKS_URL.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(id);
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_deep_link_wins() {
        let mut record = CatalogRecord::new("Deep Learning", BookSource::Google);
        record.source_id = Some("abc".into());
        record
            .metadata
            .insert("infoLink".into(), json!("https://books.google.co.jp/books?id=abc&hl=ja"));
        assert_eq!(info_url(&record), "https://books.google.co.jp/books?id=abc&hl=ja");
    }

    #[test]
    fn test_empty_deep_link_is_ignored() {
        let mut record = CatalogRecord::new("Deep Learning", BookSource::Google);
        record.source_id = Some("a b".into());
        record.metadata.insert("infoLink".into(), json!(""));
        assert_eq!(info_url(&record), "https://books.google.com/books?id=a+b");
    }

    #[test]
    fn test_open_library_canonical_link() {
        let mut record = CatalogRecord::new("SICP", BookSource::OpenLibrary);
        record.source_id = Some("OL123W".into());
        assert_eq!(info_url(&record), "https://openlibrary.org/works/OL123W");
    }

    #[test]
    fn test_generic_search_fallback() {
        let mut record = CatalogRecord::new("Clean Code", BookSource::Manual);
        record.authors = vec!["Robert Martin".into()];
        assert_eq!(
            info_url(&record),
            "https://www.google.com/search?q=Clean+Code+Robert+Martin"
        );
    }
}
