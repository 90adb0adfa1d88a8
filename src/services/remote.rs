//! Remote search API access.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::HarvestConfig;
use crate::utils::http;

/// Issues GET requests and returns the parsed JSON body.
#[async_trait]
pub trait RemoteReader: Send + Sync {
    /// GET `url` with the given query pairs.
    ///
    /// Network failures are `Transport`, non-success statuses `Upstream`,
    /// and bodies that are not JSON `Parse`.
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value>;
}

/// `RemoteReader` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpReader {
    client: Client,
}

impl HttpReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a reader with the configured user agent and timeout.
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        Ok(Self::new(http::create_async_client(config)?))
    }
}

#[async_trait]
impl RemoteReader for HttpReader {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value> {
        let request = self.client.get(url).query(params).build()?;
        let full_url = request.url().to_string();
        log::debug!("GET {}", full_url);

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| AppError::transport(&full_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: status.as_u16(),
                url: full_url,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::transport(&full_url, e))?;
        serde_json::from_slice(&body)
            .map_err(|e| AppError::parse(format!("{full_url} returned invalid JSON: {e}")))
    }
}
