//! Utility functions and helpers.

pub mod http;
pub mod uri;

use url::Url;

/// Resolve an API href against the URL of the document that contained it.
///
/// Absolute hrefs pass through. If either side cannot be parsed the href is
/// returned unchanged.
pub fn resolve_api_href(document_url: &str, href: &str) -> String {
    Url::parse(document_url)
        .and_then(|base| base.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}
