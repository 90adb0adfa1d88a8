//! AWS S3 storage implementation.
//!
//! Handles `s3://bucket/key` URIs. The bucket comes from the URI, so one
//! client serves every bucket the credentials can reach.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::storage::StorageGateway;

/// S3-backed document storage.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create S3 storage from environment configuration.
    pub async fn from_env() -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self::new(Client::new(&config)))
    }

    /// Read an object's bytes.
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        let (bucket, key) = parse_s3_uri(uri)?;
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(format!("{uri}: {e}")))?;
                Ok(bytes.into_bytes().to_vec())
            }
            Err(err) => {
                // Check if it's a "not found" error
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Err(AppError::not_found(uri.to_string()))
                } else {
                    Err(AppError::S3(format!("{uri}: {service_err}")))
                }
            }
        }
    }
}

#[async_trait]
impl StorageGateway for S3Storage {
    async fn read_text(&self, uri: &str) -> Result<String> {
        let bytes = self.read_bytes(uri).await?;
        String::from_utf8(bytes).map_err(|e| AppError::parse(format!("{uri} is not UTF-8: {e}")))
    }

    async fn write_text(&self, uri: &str, text: &str) -> Result<()> {
        let (bucket, key) = parse_s3_uri(uri)?;
        let body = ByteStream::from(text.as_bytes().to_vec());

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::S3(format!("{uri}: {e}")))?;

        log::debug!("Wrote {}", uri);
        Ok(())
    }
}

/// Split `s3://bucket/key` into bucket and key.
pub fn parse_s3_uri(uri: &str) -> Result<(&str, &str)> {
    let rest = uri
        .strip_prefix("s3://")
        .ok_or_else(|| AppError::config(format!("not an s3:// URI: {uri}")))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(AppError::config(format!("s3 URI needs a bucket and key: {uri}"))),
    }
}
