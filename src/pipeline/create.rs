// src/pipeline/create.rs

//! Catalog creation pipeline.
//!
//! Mirrors the API's root catalog, its providers and their collections into
//! a fresh static catalog. Items are added later by `update`.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Catalog, Config, NodeId, QuerySpec, Record};
use crate::services::{CardinalityProbe, RemoteReader, RetryPolicy, TreeAssembler};
use crate::storage::StorageGateway;
use crate::utils;

/// Summary of a create run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CreateSummary {
    pub providers: usize,
    pub collections: usize,
    pub items_found: u64,
    pub pruned: Vec<String>,
    pub documents_written: usize,
    pub root_uri: String,
}

/// Build a new catalog from the API at `api_url` and write it under `path`.
pub async fn run_create(
    config: &Config,
    reader: Arc<dyn RemoteReader>,
    storage: Arc<dyn StorageGateway>,
    api_url: &str,
    path: &str,
) -> Result<CreateSummary> {
    log::info!("Creating catalog from {}", api_url);

    let retry = config.harvest.retry_policy();
    let concurrency = config.harvest.max_concurrent.max(1);
    let assembler = TreeAssembler::new(storage).with_write_concurrency(config.layout.write_concurrent);
    let probe = CardinalityProbe::new(Arc::clone(&reader));

    let root_doc = fetch_record(reader.as_ref(), &retry, api_url).await?;
    let mut catalog = Catalog::new(root_doc);
    let root = catalog.root();

    // Step 1: providers
    let providers = resolve_children(&mut catalog, root, api_url, reader.as_ref(), &retry, concurrency).await?;
    log::info!("Found {} providers", providers.len());

    let pruned = assembler.prune(&mut catalog, root, &config.layout.provider_rel_set())?;
    for dropped in &pruned {
        log::info!("Dropped provider without collections: {}", dropped);
    }

    // Step 2: collections
    let mut summary = CreateSummary {
        pruned,
        ..CreateSummary::default()
    };
    let collection_rels = config.layout.collection_rel_set();

    for provider in catalog.child_ids(root) {
        let provider_name = catalog.path_string(provider);
        let collections =
            resolve_children(&mut catalog, provider, api_url, reader.as_ref(), &retry, concurrency)
                .await?;
        summary.providers += 1;

        for collection in collections {
            let items_href = catalog
                .links(collection)
                .iter()
                .find(|l| l.rel == "items")
                .map(|l| l.href.clone());

            if let Some(href) = items_href {
                match probe.count(&href, &QuerySpec::new(0)).await {
                    Ok(found) => {
                        log::info!(
                            "{}: {} items found",
                            catalog.path_string(collection),
                            found
                        );
                        summary.items_found += found;
                    }
                    Err(e) => log::warn!(
                        "Could not count items of {}: {}",
                        catalog.path_string(collection),
                        e
                    ),
                }
            }

            catalog.strip_links(collection, &collection_rels)?;
            summary.collections += 1;
        }
        log::debug!("{}: collections resolved", provider_name);
    }

    log::info!(
        "{} providers, {} collections, {} total items found",
        summary.providers,
        summary.collections,
        summary.items_found
    );

    let persisted = assembler.persist(&catalog, root, path).await?;
    summary.documents_written = persisted.documents_written;
    summary.root_uri = persisted.root_uri;
    Ok(summary)
}

/// Fetch a document from the API and parse it as a record.
async fn fetch_record(reader: &dyn RemoteReader, retry: &RetryPolicy, url: &str) -> Result<Record> {
    let body = retry.run(url, || reader.get_json(url, &[])).await?;
    Record::from_value(body)
}

/// `self` link of a node's document.
fn self_href(catalog: &Catalog, id: NodeId) -> Option<String> {
    catalog
        .links(id)
        .iter()
        .find(|l| l.rel == "self")
        .map(|l| l.href.clone())
}

/// Fetch every `child` link of a node and attach the documents as branches.
///
/// Relative hrefs resolve against the node's `self` link, else `base`.
/// Resolved links are removed from the node.
async fn resolve_children(
    catalog: &mut Catalog,
    parent: NodeId,
    base: &str,
    reader: &dyn RemoteReader,
    retry: &RetryPolicy,
    concurrency: usize,
) -> Result<Vec<NodeId>> {
    let base = self_href(catalog, parent).unwrap_or_else(|| base.to_string());
    let links = catalog.remove_links(parent, |l| l.rel == "child")?;
    let targets: Vec<String> = links
        .iter()
        .map(|l| utils::resolve_api_href(&base, &l.href))
        .collect();

    let documents: Vec<Result<Record>> = stream::iter(targets)
        .map(|url| async move { fetch_record(reader, retry, &url).await })
        .buffered(concurrency)
        .collect()
        .await;

    let mut children = Vec::with_capacity(documents.len());
    for document in documents {
        children.push(catalog.add_branch(parent, document?)?);
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::mock::MockReader;
    use crate::storage::MemoryStorage;
    use serde_json::{Value, json};

    fn api() -> MockReader {
        MockReader::new(|url, params, _| {
            let body = match url {
                "https://api/stac" => json!({
                    "id": "cmr-stac", "type": "Catalog", "stac_version": "1.0.0",
                    "description": "Root",
                    "links": [
                        {"rel": "self", "href": "https://api/stac"},
                        {"rel": "child", "href": "https://api/stac/PROV"},
                        {"rel": "child", "href": "https://api/stac/EMPTY"}
                    ]
                }),
                "https://api/stac/PROV" => json!({
                    "id": "PROV", "type": "Catalog", "stac_version": "1.0.0",
                    "description": "Provider",
                    "links": [
                        {"rel": "self", "href": "https://api/stac/PROV"},
                        {"rel": "search", "href": "https://api/stac/PROV/search"},
                        {"rel": "child", "href": "https://api/stac/PROV/collections/C1"},
                        {"rel": "child", "href": "https://api/stac/PROV/collections/C2"}
                    ]
                }),
                "https://api/stac/EMPTY" => json!({
                    "id": "EMPTY", "type": "Catalog", "stac_version": "1.0.0",
                    "description": "No collections",
                    "links": [{"rel": "search", "href": "https://api/stac/EMPTY/search"}]
                }),
                "https://api/stac/PROV/collections/C1" | "https://api/stac/PROV/collections/C2" => {
                    let id = url.rsplit('/').next().unwrap_or_default();
                    json!({
                        "id": id, "type": "Collection", "stac_version": "1.0.0",
                        "description": "Collection", "license": "proprietary",
                        "links": [
                            {"rel": "items", "href": format!("{url}/items")},
                            {"rel": "license", "href": "https://example.com/license"}
                        ]
                    })
                }
                items if items.ends_with("/items") => {
                    assert_eq!(crate::services::mock::param(params, "limit"), Some("0"));
                    json!({"context": {"matched": 42}, "features": []})
                }
                other => return Err(AppError::Upstream { status: 404, url: other.to_string() }),
            };
            Ok(body)
        })
    }

    #[tokio::test]
    async fn test_create_mirrors_providers_and_collections() {
        let storage = Arc::new(MemoryStorage::new());
        let summary = run_create(
            &Config::default(),
            Arc::new(api()),
            storage.clone(),
            "https://api/stac",
            "out",
        )
        .await
        .unwrap();

        assert_eq!(summary.providers, 1);
        assert_eq!(summary.collections, 2);
        assert_eq!(summary.items_found, 84);
        assert_eq!(summary.pruned, ["EMPTY"]);
        assert_eq!(summary.documents_written, 4);
        assert_eq!(summary.root_uri, "out/catalog.json");

        let collection: Value =
            serde_json::from_str(&storage.get("out/PROV/C1/collection.json").unwrap()).unwrap();
        let rels: Vec<&str> = collection["links"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["rel"].as_str().unwrap())
            .collect();
        assert!(!rels.contains(&"items"));
        assert!(rels.contains(&"license"));
        assert!(rels.contains(&"parent"));

        let provider: Value =
            serde_json::from_str(&storage.get("out/PROV/catalog.json").unwrap()).unwrap();
        assert!(
            provider["links"]
                .as_array()
                .unwrap()
                .iter()
                .all(|l| l["rel"] != "search")
        );
        assert!(storage.get("out/EMPTY/catalog.json").is_none());
    }

    #[tokio::test]
    async fn test_create_fails_on_unreachable_root() {
        let storage = Arc::new(MemoryStorage::new());
        let result = run_create(
            &Config::default(),
            Arc::new(api()),
            storage.clone(),
            "https://api/missing",
            "out",
        )
        .await;

        assert!(matches!(result, Err(AppError::Upstream { status: 404, .. })));
        assert!(storage.is_empty());
    }
}
