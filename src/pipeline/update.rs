// src/pipeline/update.rs

//! Collection update pipeline.
//!
//! Loads an existing catalog, harvests one collection's items from the API
//! and writes the collection subtree back.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{Config, PathTemplate, QuerySpec};
use crate::services::{PagedFetcher, RecordValidator, RemoteReader, TreeAssembler, splitter};
use crate::storage::StorageGateway;
use crate::utils::uri;

/// What to update and how.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Root `catalog.json` of the existing mirror
    pub catalog_uri: String,
    /// Root URL of the search API
    pub api_url: String,
    pub provider: String,
    pub collection: String,
    /// Optional `start/end` interval restricting the harvest
    pub datetime: Option<String>,
    /// Number of date-range batches (1 disables splitting)
    pub batches: usize,
    /// Overrides the configured item template
    pub item_template: Option<String>,
}

impl UpdateRequest {
    pub fn new(
        catalog_uri: impl Into<String>,
        api_url: impl Into<String>,
        provider: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            catalog_uri: catalog_uri.into(),
            api_url: api_url.into(),
            provider: provider.into(),
            collection: collection.into(),
            datetime: None,
            batches: 1,
            item_template: None,
        }
    }

    /// Items endpoint of the collection.
    pub fn items_endpoint(&self) -> String {
        format!(
            "{}/{}/collections/{}/items",
            self.api_url.trim_end_matches('/'),
            self.provider,
            self.collection
        )
    }
}

/// Summary of an update run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub records_fetched: usize,
    pub records_rejected: usize,
    /// Growth of the collection's leaf count
    pub leaves_inserted: usize,
    pub branches_created: usize,
    pub branches_pruned: usize,
    pub documents_written: usize,
    pub collection_uri: String,
}

/// Harvest one collection's items into an existing catalog.
pub async fn run_update(
    config: &Config,
    reader: Arc<dyn RemoteReader>,
    storage: Arc<dyn StorageGateway>,
    validator: &dyn RecordValidator,
    request: &UpdateRequest,
) -> Result<UpdateSummary> {
    let template = PathTemplate::parse(
        request
            .item_template
            .as_deref()
            .unwrap_or(&config.layout.item_template),
    )?;

    let assembler =
        TreeAssembler::new(storage).with_write_concurrency(config.layout.write_concurrent);
    let (mut catalog, collection) = assembler
        .load_path(
            &request.catalog_uri,
            &[request.provider.as_str(), request.collection.as_str()],
        )
        .await?;

    // Step 1: build the batches
    let mut query = QuerySpec::new(config.harvest.page_limit);
    if let Some(datetime) = &request.datetime {
        query = query.with_datetime(datetime.as_str());
    }
    let queries = if request.batches > 1 {
        splitter::split_query(&query, request.batches)?
    } else {
        vec![query]
    };

    // Step 2: harvest
    let endpoint = request.items_endpoint();
    let fetcher = PagedFetcher::new(reader, config.harvest.max_concurrent)
        .with_retry(config.harvest.retry_policy());

    let mut records = Vec::new();
    for (i, batch) in queries.iter().enumerate() {
        if queries.len() > 1 {
            log::info!(
                "Batch {}/{}: {}",
                i + 1,
                queries.len(),
                batch.datetime().unwrap_or_default()
            );
        }
        records.extend(fetcher.fetch_all(&endpoint, batch).await?);
    }

    let mut summary = UpdateSummary {
        records_fetched: records.len(),
        ..UpdateSummary::default()
    };

    let (accepted, rejected): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| validator.validate(r));
    summary.records_rejected = rejected.len();
    for record in &rejected {
        log::warn!("Rejected invalid record {}", record.id);
    }

    // Step 3: assemble
    let existing = catalog.leaf_count(collection);
    assembler.ingest(&mut catalog, collection, accepted)?;
    summary.branches_created = assembler.partition(&mut catalog, collection, &template)?;
    summary.branches_pruned = assembler
        .prune(&mut catalog, collection, &config.layout.item_rel_set())?
        .len();
    summary.leaves_inserted = catalog.leaf_count(collection).saturating_sub(existing);
    log::info!(
        "{}: {} records, {} new, {} subcatalogs created",
        catalog.path_string(collection),
        summary.records_fetched,
        summary.leaves_inserted,
        summary.branches_created
    );

    // Step 4: persist
    let base = uri::parent_dir(&request.catalog_uri);
    let persisted = assembler.persist(&catalog, collection, base).await?;
    summary.documents_written = persisted.documents_written;
    summary.collection_uri = persisted.root_uri;
    Ok(summary)
}
