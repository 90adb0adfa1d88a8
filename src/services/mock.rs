//! Scripted `RemoteReader` for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::RemoteReader;
use crate::error::Result;

type Handler = Box<dyn Fn(&str, &[(String, String)], usize) -> Result<Value> + Send + Sync>;

/// Answers every request through a handler and records what was asked.
///
/// The handler receives the URL, the query pairs and how many times this
/// exact request was seen before.
pub struct MockReader {
    handler: Handler,
    delay: Duration,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockReader {
    pub fn new(
        handler: impl Fn(&str, &[(String, String)], usize) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A search endpoint matching `total` records, ids `R0000..`.
    pub fn search(total: u64) -> Self {
        Self::new(move |_, params, _| Ok(search_page(total, params)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Requests carrying a `page` parameter.
    pub fn page_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|(_, params)| param(params, "page").is_some())
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteReader for MockReader {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let seen = {
            let mut calls = self.calls.lock().unwrap();
            let seen = calls
                .iter()
                .filter(|(u, p)| u == url && p.as_slice() == params)
                .count();
            calls.push((url.to_string(), params.to_vec()));
            seen
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = (self.handler)(url, params, seen);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// One item with a daily timestamp derived from its index.
pub fn item(index: u64) -> Value {
    json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "id": format!("R{index:04}"),
        "geometry": null,
        "properties": {
            "datetime": format!("2023-06-{:02}T12:00:00Z", index % 28 + 1)
        },
        "links": [{"rel": "self", "href": format!("https://api/items/R{index:04}")}]
    })
}

/// A search response page for a result set of `total` items.
pub fn search_page(total: u64, params: &[(String, String)]) -> Value {
    let limit: u64 = param(params, "limit").and_then(|v| v.parse().ok()).unwrap_or(10);
    let page: u64 = param(params, "page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let first = (page - 1) * limit;
    let last = (first + limit).min(total);
    let features: Vec<Value> = (first..last).map(item).collect();
    json!({
        "type": "FeatureCollection",
        "context": {"matched": total, "returned": features.len(), "limit": limit},
        "features": features
    })
}
