//! Catalog tree assembly and persistence.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use super::layout;
use crate::error::{AppError, Result};
use crate::models::{Catalog, NodeId, PathTemplate, Record, STAC_VERSION};
use crate::storage::StorageGateway;
use crate::utils::uri;

const DEFAULT_WRITE_CONCURRENCY: usize = 32;

/// Outcome of writing a subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistSummary {
    pub documents_written: usize,
    pub root_uri: String,
}

/// Builds the catalog tree and moves it to and from storage.
pub struct TreeAssembler {
    storage: Arc<dyn StorageGateway>,
    write_concurrency: usize,
}

impl TreeAssembler {
    pub fn new(storage: Arc<dyn StorageGateway>) -> Self {
        Self {
            storage,
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
        }
    }

    pub fn with_write_concurrency(mut self, limit: usize) -> Self {
        self.write_concurrency = limit.max(1);
        self
    }

    /// Insert one leaf per record directly under `root`.
    ///
    /// A leaf with the same id is overwritten. Returns how many leaves are new.
    pub fn ingest(&self, catalog: &mut Catalog, root: NodeId, records: Vec<Record>) -> Result<usize> {
        let mut created = 0;
        for record in records {
            let (_, new) = catalog.upsert_leaf(root, record)?;
            if new {
                created += 1;
            }
        }
        log::debug!(
            "Ingested {} new leaves under {}",
            created,
            catalog.path_string(root)
        );
        Ok(created)
    }

    /// Move the leaves directly under `root` into template-derived branches.
    ///
    /// Missing branches are created; returns how many. Leaves the template
    /// cannot place stay where they are.
    pub fn partition(
        &self,
        catalog: &mut Catalog,
        root: NodeId,
        template: &PathTemplate,
    ) -> Result<usize> {
        let stac_version = catalog
            .get(root)
            .and_then(|n| n.document().stac_version())
            .unwrap_or(STAC_VERSION)
            .to_string();

        let leaves: Vec<NodeId> = catalog
            .child_ids(root)
            .into_iter()
            .filter(|id| catalog.is_leaf(*id))
            .collect();

        let mut created = 0;
        let mut unplaced = 0;
        for leaf in leaves {
            let Some(names) = catalog.get(leaf).and_then(|n| template.apply(n.document())) else {
                unplaced += 1;
                continue;
            };

            let mut parent = root;
            let mut blocked = false;
            for name in &names {
                parent = match catalog.child(parent, name) {
                    Some(existing) if catalog.is_branch(existing) => existing,
                    Some(_) => {
                        blocked = true;
                        break;
                    }
                    None => {
                        created += 1;
                        catalog.add_branch(parent, Record::catalog(name, name, &stac_version))?
                    }
                };
            }
            if blocked {
                log::warn!(
                    "Cannot place {} under {}: a leaf already uses that name",
                    catalog.path_string(leaf),
                    names.join("/")
                );
                unplaced += 1;
                continue;
            }

            let record = catalog.take_leaf(leaf)?;
            catalog.upsert_leaf(parent, record)?;
        }

        if unplaced > 0 {
            log::warn!(
                "{} records under {} could not be placed by '{}'",
                unplaced,
                catalog.path_string(root),
                template
            );
        }
        Ok(created)
    }

    /// Strip links of the given relations under `root`, then remove branches
    /// left without children, bottom-up. `root` itself is never removed.
    ///
    /// Returns the paths of the removed branches.
    pub fn prune(
        &self,
        catalog: &mut Catalog,
        root: NodeId,
        kinds: &HashSet<String>,
    ) -> Result<Vec<String>> {
        let subtree = catalog.descendants(root);
        for id in &subtree {
            catalog.strip_links(*id, kinds)?;
        }

        let mut removed = Vec::new();
        for id in subtree.into_iter().rev() {
            if id == root || !catalog.is_branch(id) {
                continue;
            }
            if catalog.child_count(id) == 0 {
                removed.push(catalog.path_string(id));
                catalog.remove(id)?;
            }
        }

        if !removed.is_empty() {
            log::info!("Pruned {} empty branches", removed.len());
        }
        Ok(removed)
    }

    /// Write `subtree` under `base_uri`, deepest level first.
    ///
    /// Locations come from the full tree, so a subtree lands exactly where a
    /// full write would put it.
    pub async fn persist(
        &self,
        catalog: &Catalog,
        subtree: NodeId,
        base_uri: &str,
    ) -> Result<PersistSummary> {
        let mut levels: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for id in catalog.descendants(subtree) {
            levels.entry(catalog.depth(id)).or_default().push(id);
        }

        let mut written = 0;
        for (depth, nodes) in levels.into_iter().rev() {
            log::debug!("Writing {} documents at depth {}", nodes.len(), depth);
            let mut writes = stream::iter(nodes)
                .map(|id| async move {
                    let target = layout::node_uri(catalog, id, base_uri);
                    let result = match layout::render(catalog, id, base_uri) {
                        Ok((_, json)) => self.storage.write_text(&target, &json).await,
                        Err(err) => Err(err),
                    };
                    (target, result)
                })
                .buffer_unordered(self.write_concurrency);

            let mut failure = None;
            while let Some((target, result)) = writes.next().await {
                match result {
                    Ok(()) => written += 1,
                    Err(err) => {
                        log::error!("Failed to write {}: {}", target, err);
                        failure.get_or_insert((target, err));
                    }
                }
            }
            if let Some((target, err)) = failure {
                return Err(AppError::persist(target, written, err));
            }
        }

        let root_uri = layout::node_uri(catalog, subtree, base_uri);
        log::info!("Wrote {} documents under {}", written, root_uri);
        Ok(PersistSummary {
            documents_written: written,
            root_uri,
        })
    }

    /// Read and parse one stored document.
    pub async fn read_document(&self, target: &str) -> Result<Record> {
        let text = self.storage.read_text(target).await?;
        Record::from_json(&text).map_err(|e| AppError::parse(format!("{target}: {e}")))
    }

    /// Rebuild a whole catalog from its root document.
    pub async fn load(&self, root_uri: &str) -> Result<Catalog> {
        let mut catalog = Catalog::new(self.read_document(root_uri).await?);
        let root = catalog.root();
        let count = self.resolve_subtree(&mut catalog, root, root_uri).await?;
        log::info!("Loaded {} documents from {}", count + 1, root_uri);
        Ok(catalog)
    }

    /// Load only the branches along `path`, then everything below its end.
    ///
    /// Siblings along the way stay as unresolved links. Returns the tree and
    /// the node at the end of the path.
    pub async fn load_path(&self, root_uri: &str, path: &[&str]) -> Result<(Catalog, NodeId)> {
        let mut catalog = Catalog::new(self.read_document(root_uri).await?);
        let mut current = catalog.root();
        let mut current_uri = root_uri.to_string();

        for name in path {
            let mut candidates: Vec<String> = catalog
                .links(current)
                .iter()
                .filter(|l| l.rel == "child" && uri::scheme(&l.href).is_none())
                .map(|l| l.href.clone())
                .collect();
            candidates.sort_by_key(|href| !href.split('/').any(|s| s == *name));

            let mut found = None;
            for href in candidates {
                let target = uri::resolve_href(&current_uri, &href)?;
                let document = self.read_document(&target).await?;
                if document.id == *name {
                    found = Some((href, target, document));
                    break;
                }
            }
            let (href, target, document) = found.ok_or_else(|| {
                AppError::not_found(format!(
                    "'{}' under {}",
                    name,
                    catalog.path_string(current)
                ))
            })?;

            catalog.remove_links(current, |l| l.rel == "child" && l.href == href)?;
            current = catalog.add_branch(current, document)?;
            current_uri = target;
        }

        let count = self.resolve_subtree(&mut catalog, current, &current_uri).await?;
        log::info!(
            "Loaded {} with {} documents below it",
            catalog.path_string(current),
            count
        );
        Ok((catalog, current))
    }

    /// Follow relative `child`/`item` links below `start`, level by level.
    ///
    /// Resolved links are removed from the descriptors; the tree regenerates
    /// them on render. Returns the number of documents loaded.
    async fn resolve_subtree(
        &self,
        catalog: &mut Catalog,
        start: NodeId,
        start_uri: &str,
    ) -> Result<usize> {
        let mut frontier = vec![(start, start_uri.to_string())];
        let mut loaded = 0;

        while !frontier.is_empty() {
            let mut targets = Vec::new();
            for (id, doc_uri) in &frontier {
                let links = catalog
                    .remove_links(*id, |l| l.is_reference() && uri::scheme(&l.href).is_none())?;
                for link in links {
                    targets.push((*id, uri::resolve_href(doc_uri, &link.href)?));
                }
            }

            let documents: Vec<_> = stream::iter(targets)
                .map(|(parent, target)| async move {
                    let document = self.read_document(&target).await;
                    (parent, target, document)
                })
                .buffered(self.write_concurrency)
                .collect()
                .await;

            let mut next = Vec::new();
            for (parent, target, document) in documents {
                let document = document?;
                if document.kind() == Some("Feature") {
                    catalog.upsert_leaf(parent, document)?;
                } else {
                    let id = catalog.add_branch(parent, document)?;
                    next.push((id, target));
                }
                loaded += 1;
            }
            frontier = next;
        }

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Link;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    fn item(id: &str, datetime: Option<&str>) -> Record {
        Record::from_value(json!({
            "id": id, "type": "Feature", "geometry": null,
            "properties": {"datetime": datetime},
            "links": [{"rel": "next", "href": "https://api/items?page=2"}]
        }))
        .unwrap()
    }

    fn collection(id: &str) -> Record {
        Record::from_value(json!({
            "id": id, "type": "Collection", "stac_version": "1.0.0",
            "description": "test", "license": "proprietary", "links": []
        }))
        .unwrap()
    }

    fn setup() -> (Catalog, NodeId, NodeId) {
        let mut catalog = Catalog::new(Record::catalog("root", "Root", "1.0.0"));
        let provider = catalog
            .add_branch(catalog.root(), Record::catalog("PROV", "Provider", "1.0.0"))
            .unwrap();
        let coll = catalog.add_branch(provider, collection("C1")).unwrap();
        (catalog, provider, coll)
    }

    fn assembler(storage: Arc<dyn StorageGateway>) -> TreeAssembler {
        TreeAssembler::new(storage).with_write_concurrency(4)
    }

    fn template() -> PathTemplate {
        PathTemplate::parse("${year}/${month}/${day}").unwrap()
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let (mut catalog, _, coll) = setup();
        let asm = assembler(Arc::new(MemoryStorage::new()));
        let records = vec![
            item("a", Some("2023-06-15T00:00:00Z")),
            item("b", Some("2023-06-16T00:00:00Z")),
        ];

        assert_eq!(asm.ingest(&mut catalog, coll, records.clone()).unwrap(), 2);
        assert_eq!(asm.ingest(&mut catalog, coll, records).unwrap(), 0);
        assert_eq!(catalog.leaf_count(coll), 2);
    }

    #[test]
    fn test_partition_by_day() {
        let (mut catalog, _, coll) = setup();
        let asm = assembler(Arc::new(MemoryStorage::new()));
        asm.ingest(
            &mut catalog,
            coll,
            vec![
                item("a", Some("2023-06-15T10:00:00Z")),
                item("b", Some("2023-06-15T22:00:00Z")),
                item("c", Some("2023-07-01T00:00:00Z")),
            ],
        )
        .unwrap();

        let created = asm.partition(&mut catalog, coll, &template()).unwrap();
        assert_eq!(created, 5);

        let day = ["2023", "06", "15"]
            .iter()
            .try_fold(coll, |node, name| catalog.child(node, name))
            .unwrap();
        let leaf = catalog.child(day, "a").unwrap();
        assert_eq!(catalog.path(leaf), ["PROV", "C1", "2023", "06", "15", "a"]);
        assert_eq!(catalog.leaf_count(day), 2);
        assert!(catalog.child(coll, "a").is_none());

        // Running again over the same records creates nothing new.
        asm.ingest(&mut catalog, coll, vec![item("a", Some("2023-06-15T10:00:00Z"))])
            .unwrap();
        assert_eq!(asm.partition(&mut catalog, coll, &template()).unwrap(), 0);
        assert_eq!(catalog.leaf_count(coll), 3);
    }

    #[test]
    fn test_partition_leaves_undated_at_root() {
        let (mut catalog, _, coll) = setup();
        let asm = assembler(Arc::new(MemoryStorage::new()));
        asm.ingest(&mut catalog, coll, vec![item("undated", None)])
            .unwrap();

        assert_eq!(asm.partition(&mut catalog, coll, &template()).unwrap(), 0);
        assert!(catalog.child(coll, "undated").is_some());
    }

    #[tokio::test]
    async fn test_unsafe_names_never_reach_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let asm = assembler(storage.clone());
        let (mut catalog, _, coll) = setup();

        let mut escaping = item("a", Some("2023-06-15T10:00:00Z"));
        escaping.id = "../../../etc/evil".to_string();
        assert!(asm.ingest(&mut catalog, coll, vec![escaping]).is_err());

        let mut dotted = item("b", Some("2023-06-15T10:00:00Z"));
        dotted.fields["properties"]["platform"] = json!("..");
        asm.ingest(&mut catalog, coll, vec![dotted]).unwrap();
        let by_platform = PathTemplate::parse("${platform}/${year}").unwrap();
        assert_eq!(asm.partition(&mut catalog, coll, &by_platform).unwrap(), 0);
        assert!(catalog.child(coll, "b").is_some());

        let root = catalog.root();
        asm.persist(&catalog, root, "/data/mirror").await.unwrap();
        let keys = storage.uris();
        assert!(keys.iter().all(|k| k.starts_with("/data/mirror/") && !k.contains("..")));
        assert!(keys.contains(&"/data/mirror/PROV/C1/b/b.json".to_string()));
    }

    #[test]
    fn test_prune_cascades_but_keeps_root() {
        let (mut catalog, provider, coll) = setup();
        let asm = assembler(Arc::new(MemoryStorage::new()));
        let year = catalog
            .add_branch(coll, Record::catalog("2023", "2023", "1.0.0"))
            .unwrap();
        catalog
            .add_branch(year, Record::catalog("06", "06", "1.0.0"))
            .unwrap();

        let kinds: HashSet<String> = ["next".to_string()].into();
        let root = catalog.root();
        let removed = asm.prune(&mut catalog, root, &kinds).unwrap();

        assert_eq!(removed, ["PROV/C1/2023/06", "PROV/C1/2023", "PROV/C1", "PROV"]);
        assert!(!catalog.contains(provider));
        assert!(catalog.contains(catalog.root()));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_prune_strips_links_and_keeps_referencing_branches() {
        let (mut catalog, provider, coll) = setup();
        let asm = assembler(Arc::new(MemoryStorage::new()));
        asm.ingest(&mut catalog, coll, vec![item("a", None)]).unwrap();

        let mut remote = Record::catalog("OTHER", "Remote", "1.0.0");
        remote.links.push(Link::new("child", "https://api/OTHER/collections/X"));
        remote.links.push(Link::new("search", "https://api/OTHER/search"));
        let other = catalog.add_branch(catalog.root(), remote).unwrap();

        let kinds: HashSet<String> = ["next".to_string(), "search".to_string()].into();
        let root = catalog.root();
        let removed = asm.prune(&mut catalog, root, &kinds).unwrap();

        assert!(removed.is_empty());
        assert!(catalog.contains(provider));
        assert_eq!(catalog.links(other).len(), 1);
        let leaf = catalog.child(coll, "a").unwrap();
        assert!(catalog.links(leaf).is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let asm = assembler(storage.clone());
        let (mut catalog, _, coll) = setup();
        asm.ingest(
            &mut catalog,
            coll,
            vec![
                item("a", Some("2023-06-15T10:00:00Z")),
                item("b", Some("2023-06-16T10:00:00Z")),
            ],
        )
        .unwrap();
        asm.partition(&mut catalog, coll, &template()).unwrap();

        let summary = asm
            .persist(&catalog, catalog.root(), "s3://bucket/mirror")
            .await
            .unwrap();
        assert_eq!(summary.documents_written, catalog.len());
        assert_eq!(summary.root_uri, "s3://bucket/mirror/catalog.json");
        assert!(
            storage
                .get("s3://bucket/mirror/PROV/C1/2023/06/15/a/a.json")
                .is_some()
        );
        assert!(storage.get("s3://bucket/mirror/PROV/C1/collection.json").is_some());

        let loaded = asm.load("s3://bucket/mirror/catalog.json").await.unwrap();
        assert_eq!(loaded.len(), catalog.len());
        assert_eq!(loaded.leaf_count(loaded.root()), 2);

        let (partial, node) = asm
            .load_path("s3://bucket/mirror/catalog.json", &["PROV", "C1"])
            .await
            .unwrap();
        assert_eq!(partial.path(node), ["PROV", "C1"]);
        assert_eq!(partial.leaf_count(node), 2);
    }

    #[tokio::test]
    async fn test_load_path_missing_branch() {
        let storage = Arc::new(MemoryStorage::new());
        let asm = assembler(storage.clone());
        let (catalog, ..) = setup();
        asm.persist(&catalog, catalog.root(), "mem").await.unwrap();

        let result = asm.load_path("mem/catalog.json", &["PROV", "NOPE"]).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_subtree_persist_keeps_siblings_untouched() {
        let storage = Arc::new(MemoryStorage::new());
        let asm = assembler(storage.clone());
        let (mut catalog, provider, _) = setup();
        catalog.add_branch(provider, collection("C2")).unwrap();
        asm.persist(&catalog, catalog.root(), "mem").await.unwrap();

        let (mut partial, coll) = asm.load_path("mem/catalog.json", &["PROV", "C1"]).await.unwrap();
        asm.ingest(&mut partial, coll, vec![item("z", Some("2024-01-02T00:00:00Z"))])
            .unwrap();
        asm.partition(&mut partial, coll, &template()).unwrap();
        let summary = asm.persist(&partial, coll, "mem").await.unwrap();

        assert_eq!(summary.root_uri, "mem/PROV/C1/collection.json");
        assert_eq!(summary.documents_written, 5);
        assert!(storage.get("mem/PROV/C1/2024/01/02/z/z.json").is_some());

        let provider_doc: Value =
            serde_json::from_str(&storage.get("mem/PROV/catalog.json").unwrap()).unwrap();
        assert_eq!(provider_doc["links"].as_array().unwrap().len(), 4);
    }

    struct FailingStorage;

    #[async_trait]
    impl StorageGateway for FailingStorage {
        async fn read_text(&self, uri: &str) -> Result<String> {
            Err(AppError::not_found(uri.to_string()))
        }

        async fn write_text(&self, uri: &str, _text: &str) -> Result<()> {
            if uri.ends_with("collection.json") {
                return Err(AppError::S3("access denied".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_persist_failure_reports_progress() {
        let asm = assembler(Arc::new(FailingStorage));
        let (mut catalog, _, coll) = setup();
        asm.ingest(&mut catalog, coll, vec![item("a", None)]).unwrap();

        let err = asm
            .persist(&catalog, catalog.root(), "s3://bucket/m")
            .await
            .unwrap_err();
        match err {
            AppError::Persist { uri, written, .. } => {
                assert_eq!(uri, "s3://bucket/m/PROV/C1/collection.json");
                assert_eq!(written, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
