//! Storage URI helpers.
//!
//! Storage URIs are either `scheme://bucket/key` or plain filesystem paths.
//! Layout code builds both as `/`-separated strings; hrefs read back from a
//! `scheme://` document are resolved with [`Url::join`].

use url::Url;

use crate::error::Result;

/// Scheme of a URI (`s3`, `https`), or `None` for a plain path.
pub fn scheme(uri: &str) -> Option<&str> {
    uri.split_once("://").map(|(scheme, _)| scheme)
}

/// Split `scheme://authority/path` into `("scheme://authority", "/path")`.
fn split_authority(uri: &str) -> (&str, &str) {
    match uri.find("://") {
        Some(i) => {
            let rest = &uri[i + 3..];
            match rest.find('/') {
                Some(j) => uri.split_at(i + 3 + j),
                None => (uri, ""),
            }
        }
        None => ("", uri),
    }
}

/// Directory containing a document, without a trailing slash.
pub fn parent_dir(uri: &str) -> &str {
    let (prefix, path) = split_authority(uri);
    match path.rfind('/') {
        Some(i) => &uri[..prefix.len() + i],
        None if prefix.is_empty() => "",
        None => uri,
    }
}

/// Join a relative path onto a base directory URI.
pub fn join(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches("./");
    if base.is_empty() || base == "." {
        relative.to_string()
    } else {
        format!("{base}/{relative}")
    }
}

/// Resolve an href found in the document at `doc_uri`.
///
/// Absolute hrefs are returned unchanged. Against a `scheme://` document the
/// href is joined as a URL; against a plain path it is resolved relative to
/// the document's directory with `.` and `..` collapsed.
pub fn resolve_href(doc_uri: &str, href: &str) -> Result<String> {
    if scheme(href).is_some() {
        return Ok(href.to_string());
    }
    if scheme(doc_uri).is_some() {
        return Ok(Url::parse(doc_uri)?.join(href)?.into());
    }
    if href.starts_with('/') {
        return Ok(href.to_string());
    }

    let absolute = doc_uri.starts_with('/');
    let dir = match doc_uri.rfind('/') {
        Some(i) => &doc_uri[..i],
        None => "",
    };

    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in href.split('/') {
        match part {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if !absolute => segments.push(".."),
                _ => {}
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    Ok(if absolute { format!("/{joined}") } else { joined })
}

/// Relative href from one document to another, both given as path segments
/// below a common base (file name last).
pub fn relative_href(from: &[String], to: &[String]) -> String {
    let from_dir = &from[..from.len().saturating_sub(1)];
    let common = from_dir
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let ups = from_dir.len() - common;
    let rest = to[common..].join("/");
    if ups == 0 {
        format!("./{rest}")
    } else {
        format!("{}{}", "../".repeat(ups), rest)
    }
}
