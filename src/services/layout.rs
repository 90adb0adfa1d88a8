//! Canonical document locations and structural links.
//!
//! Every node's location is derived from its path in the tree:
//!
//! - the root is `catalog.json`
//! - a branch is `<path>/catalog.json`, or `<path>/collection.json` when
//!   its descriptor is a collection
//! - a leaf is `<parent path>/<id>/<id>.json`
//!
//! Structural links (`root`, `parent`, `child`, `item`, `collection`) are
//! regenerated from the tree as relative hrefs. Only the root carries a
//! `self` link, which is absolute.

use crate::error::{AppError, Result};
use crate::models::{Catalog, Link, NodeId};
use crate::utils::uri;

const ROOT_FILE: &str = "catalog.json";
const COLLECTION_FILE: &str = "collection.json";
const JSON: &str = "application/json";
const GEO_JSON: &str = "application/geo+json";

/// Path segments of a node's document below the base directory.
pub fn relative_path(catalog: &Catalog, id: NodeId) -> Vec<String> {
    let mut segments = catalog.path(id);
    let Some(node) = catalog.get(id) else {
        return segments;
    };

    if node.is_leaf() {
        segments.push(format!("{}.json", node.name()));
    } else if id != catalog.root() && node.document().is_collection() {
        segments.push(COLLECTION_FILE.to_string());
    } else {
        segments.push(ROOT_FILE.to_string());
    }
    segments
}

/// Absolute URI of a node's document under `base`.
pub fn node_uri(catalog: &Catalog, id: NodeId, base: &str) -> String {
    uri::join(base, &relative_path(catalog, id).join("/"))
}

/// Whether a stored link is regenerated from the tree for this node.
fn is_structural(link: &Link, is_leaf: bool) -> bool {
    matches!(link.rel.as_str(), "self" | "root" | "parent") || (is_leaf && link.rel == "collection")
}

/// Serialize a node with its structural links rewritten.
///
/// Returns the document's URI and its pretty-printed JSON. Reference links
/// that are not backed by a node in the tree are kept as they are.
pub fn render(catalog: &Catalog, id: NodeId, base: &str) -> Result<(String, String)> {
    let node = catalog
        .get(id)
        .ok_or_else(|| AppError::not_found(format!("catalog node {id:?}")))?;
    let is_leaf = node.is_leaf();
    let own = relative_path(catalog, id);
    let root_path = relative_path(catalog, catalog.root());
    let own_uri = uri::join(base, &own.join("/"));

    let mut document = node.document().clone();
    let retained = document.remove_links(|l| !is_structural(l, is_leaf));

    let mut links = vec![Link::new("root", uri::relative_href(&own, &root_path)).with_type(JSON)];
    match node.parent() {
        None => links.push(Link::new("self", own_uri.clone()).with_type(JSON)),
        Some(parent) => {
            let parent_path = relative_path(catalog, parent);
            links.push(Link::new("parent", uri::relative_href(&own, &parent_path)).with_type(JSON));
        }
    }
    if is_leaf {
        if let Some(collection) = node.parent().and_then(|p| catalog.enclosing_collection(p)) {
            let collection_path = relative_path(catalog, collection);
            links.push(
                Link::new("collection", uri::relative_href(&own, &collection_path)).with_type(JSON),
            );
        }
    }
    links.extend(retained);

    for child in node.children() {
        let Some(child_node) = catalog.get(child) else {
            continue;
        };
        let href = uri::relative_href(&own, &relative_path(catalog, child));
        let link = if child_node.is_leaf() {
            Link::new("item", href).with_type(GEO_JSON)
        } else {
            Link::new("child", href).with_type(JSON)
        };
        links.push(link);
    }

    document.links = links;
    Ok((own_uri, document.to_json_pretty()?))
}
