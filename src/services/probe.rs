//! Result-set size discovery.

use std::sync::Arc;

use serde_json::Value;

use super::RemoteReader;
use crate::error::{AppError, Result};
use crate::models::QuerySpec;

/// Asks the search API how many records a query matches.
#[derive(Clone)]
pub struct CardinalityProbe {
    reader: Arc<dyn RemoteReader>,
}

impl CardinalityProbe {
    pub fn new(reader: Arc<dyn RemoteReader>) -> Self {
        Self { reader }
    }

    /// Matched count for `query` at `endpoint`.
    ///
    /// The request is sent with `limit=0` and no page cursor. Failures are
    /// not retried.
    pub async fn count(&self, endpoint: &str, query: &QuerySpec) -> Result<u64> {
        let probe = query.clone().with_limit(0).without_page();
        let body = self.reader.get_json(endpoint, &probe.to_pairs()).await?;
        let count = matched_count(&body)
            .ok_or_else(|| AppError::parse(format!("{endpoint} reported no matched count")))?;
        log::debug!("{} matches {} records", endpoint, count);
        Ok(count)
    }
}

/// `context.matched`, or the top-level `numberMatched`.
pub fn matched_count(body: &Value) -> Option<u64> {
    body.pointer("/context/matched")
        .and_then(Value::as_u64)
        .or_else(|| body.get("numberMatched").and_then(Value::as_u64))
}
