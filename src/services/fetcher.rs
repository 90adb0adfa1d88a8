//! Concurrent page fetching.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use serde_json::Value;

use super::{CardinalityProbe, RemoteReader, RetryPolicy};
use crate::error::{AppError, Result};
use crate::models::{QuerySpec, Record};

/// Fetches every page of a search under a concurrency cap.
pub struct PagedFetcher {
    reader: Arc<dyn RemoteReader>,
    probe: CardinalityProbe,
    concurrency: usize,
    retry: RetryPolicy,
}

impl PagedFetcher {
    pub fn new(reader: Arc<dyn RemoteReader>, concurrency: usize) -> Self {
        Self {
            probe: CardinalityProbe::new(Arc::clone(&reader)),
            reader,
            concurrency: concurrency.max(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch all records matching `query`.
    ///
    /// The matched count decides how many pages are requested. Once a page
    /// fails for good no further pages are started; pages already in flight
    /// are drained and the first error is returned.
    pub async fn fetch_all(&self, endpoint: &str, query: &QuerySpec) -> Result<Vec<Record>> {
        if query.limit() == 0 {
            return Err(AppError::validation("page limit must be greater than zero"));
        }

        let matched = self.probe.count(endpoint, query).await?;
        if matched == 0 {
            log::info!("{} matched no records", endpoint);
            return Ok(Vec::new());
        }

        let total_pages = matched.div_ceil(u64::from(query.limit()));
        let total_pages = u32::try_from(total_pages)
            .map_err(|_| AppError::validation(format!("{total_pages} pages is too many")))?;
        log::info!(
            "Fetching {} records in {} pages from {}",
            matched,
            total_pages,
            endpoint
        );

        let aborted = AtomicBool::new(false);
        let mut pages = stream::iter(1..=total_pages)
            .map(|page| {
                let aborted = &aborted;
                let query = query.clone().with_page(page);
                async move {
                    if aborted.load(Ordering::SeqCst) {
                        return None;
                    }
                    let result = self.fetch_page(endpoint, &query).await;
                    if result.is_err() {
                        aborted.store(true, Ordering::SeqCst);
                    }
                    Some((page, result))
                }
            })
            .buffer_unordered(self.concurrency);

        let mut records = Vec::new();
        let mut first_error = None;
        while let Some(outcome) = pages.next().await {
            match outcome {
                Some((_, Ok(batch))) => records.extend(batch),
                Some((page, Err(err))) => {
                    log::error!("Page {} of {} failed: {}", page, endpoint, err);
                    first_error.get_or_insert(err);
                }
                None => {}
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                log::info!("Fetched {} records from {}", records.len(), endpoint);
                Ok(records)
            }
        }
    }

    /// Fetch and parse one page through the retry policy.
    pub async fn fetch_page(&self, endpoint: &str, query: &QuerySpec) -> Result<Vec<Record>> {
        let pairs = query.to_pairs();
        let context = format!("{} page {}", endpoint, query.page().unwrap_or(1));
        let body = self
            .retry
            .run(&context, || self.reader.get_json(endpoint, &pairs))
            .await?;
        parse_features(&body)
    }
}

/// Parse the `features` array of a search response.
pub fn parse_features(body: &Value) -> Result<Vec<Record>> {
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::parse("response has no features array"))?;
    features.iter().cloned().map(Record::from_value).collect()
}
