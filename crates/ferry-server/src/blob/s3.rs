//! S3 (or S3-compatible) blobs addressed as `s3://bucket/key`

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    Client,
};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info, instrument};

use super::{BlobSource, BlobStream};
use crate::error::BlobError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl S3Config {
    /// Read `S3_ENDPOINT`, `S3_REGION`, `S3_ACCESS_KEY`, `S3_SECRET_KEY` and
    /// `S3_PATH_STYLE`. Returns `None` when neither an endpoint nor an
    /// access key is configured, leaving S3 locators unsupported.
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("S3_ENDPOINT").ok();
        let access_key = env::var("S3_ACCESS_KEY")
            .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
            .ok();

        if endpoint.is_none() && access_key.is_none() {
            return None;
        }

        Some(Self {
            endpoint,
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key: access_key.unwrap_or_default(),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_default(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        })
    }

    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }
}

/// Split `s3://bucket/key` into bucket and key.
pub fn parse_s3_uri(locator: &str) -> Result<(&str, &str), BlobError> {
    let rest = locator
        .strip_prefix("s3://")
        .ok_or_else(|| BlobError::InvalidLocator(locator.to_string()))?;

    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(BlobError::InvalidLocator(locator.to_string())),
    }
}

#[derive(Clone)]
pub struct S3BlobSource {
    client: Client,
}

impl S3BlobSource {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "ferry-blob",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(endpoint = ?config.endpoint, region = %config.region, "S3 blob source initialized");

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl BlobSource for S3BlobSource {
    #[instrument(skip(self))]
    async fn open(&self, locator: &str) -> Result<BlobStream, BlobError> {
        let (bucket, key) = parse_s3_uri(locator)?;

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| BlobError::ObjectStore(DisplayErrorContext(&e).to_string()))?;

        debug!(bucket, key, size = ?response.content_length(), "Opened S3 blob");

        Ok(Box::pin(response.body.into_async_read()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_uri() {
        assert_eq!(
            parse_s3_uri("s3://imports/acme/users.csv").unwrap(),
            ("imports", "acme/users.csv")
        );
        assert!(parse_s3_uri("s3://imports").is_err());
        assert!(parse_s3_uri("s3:///key").is_err());
        assert!(parse_s3_uri("file:///tmp/a.csv").is_err());
    }

    #[test]
    fn test_for_minio() {
        let config = S3Config::for_minio("http://localhost:9000");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.path_style);
    }
}
