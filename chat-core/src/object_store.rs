use anyhow::{anyhow, Result};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing;

use crate::config::StorageConfig;

/// Object-store client for voice attachments and profile photos.
///
/// Persisted references are bucket keys; clients only ever see time-limited
/// presigned GET URLs. Runs disabled when no bucket is configured, in which
/// case uploads fail and photo resolution degrades to `None`.
#[derive(Clone)]
pub struct ObjectStore {
    inner: Option<ObjectStoreInner>,
    url_ttl: Duration,
}

#[derive(Clone)]
struct ObjectStoreInner {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    pub async fn new(config: &StorageConfig) -> Self {
        let url_ttl = Duration::from_secs(config.signed_url_ttl_secs);

        let bucket = match &config.bucket {
            Some(b) => b.clone(),
            None => {
                tracing::warn!("Object storage disabled (STORAGE_BUCKET not set)");
                return ObjectStore { inner: None, url_ttl };
            }
        };

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints (minio et al.) need path-style addressing.
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if config.endpoint.is_some() {
            builder = builder.force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        tracing::info!("Object storage initialized (bucket: {})", bucket);

        ObjectStore {
            inner: Some(ObjectStoreInner { client, bucket }),
            url_ttl,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| anyhow!("object storage is not configured"))?;

        inner
            .client
            .put_object()
            .bucket(&inner.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| anyhow!("failed to upload object {}: {}", key, e))?;

        Ok(())
    }

    /// Time-limited signed GET URL for a stored key.
    pub async fn presigned_get(&self, key: &str) -> Result<String> {
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| anyhow!("object storage is not configured"))?;

        let presigning = PresigningConfig::expires_in(self.url_ttl)
            .map_err(|e| anyhow!("invalid presigning TTL: {}", e))?;

        let request = inner
            .client
            .get_object()
            .bucket(&inner.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| anyhow!("failed to presign object {}: {}", key, e))?;

        Ok(request.uri().to_string())
    }
}
