use crate::config::{EndpointProfile, StoreConfig};
use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// S3-compatible object store client bound to one endpoint profile
///
/// The gateway holds two of these: one on the internal endpoint for bucket
/// bootstrap and object writes, and one on the public endpoint whose signed
/// URLs are handed to clients.
pub struct StoreClient {
    client: S3Client,
    profile: EndpointProfile,
}

impl StoreClient {
    /// Create a client talking to the given endpoint profile
    pub async fn new(config: &StoreConfig, profile: EndpointProfile) -> Result<Self> {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "media-gateway",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        // Path-style addressing keeps bucket names out of the hostname,
        // required by MinIO deployments without wildcard DNS
        let s3_config = S3ConfigBuilder::from(&aws_config)
            .endpoint_url(profile.url())
            .force_path_style(true)
            .build();

        let client = S3Client::from_conf(s3_config);

        info!(
            endpoint = %profile.url(),
            region = %config.region,
            "Object store client initialized"
        );

        Ok(Self { client, profile })
    }

    /// Endpoint profile this client signs against
    pub fn profile(&self) -> &EndpointProfile {
        &self.profile
    }

    /// Check whether a bucket exists
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    Ok(false)
                } else {
                    Err(e).context("Failed to check bucket existence")
                }
            }
        }
    }

    /// Create a bucket
    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .with_context(|| format!("Failed to create bucket '{bucket}'"))?;

        info!(bucket = %bucket, "Bucket created");
        Ok(())
    }

    /// Upload an object
    #[instrument(skip(self, data), fields(bucket = %bucket, key = %key, size_bytes = data.len()))]
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let body = ByteStream::from(data);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .context("Failed to upload object")?;

        debug!("Object stored");
        Ok(())
    }

    /// Presign a GET for an existing object
    pub async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .context("Failed to create presigning config")?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .context("Failed to presign GET URL")?;

        Ok(presigned.uri().to_string())
    }

    /// Presign a PUT so a client can upload directly to the store
    pub async fn presigned_put_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .context("Failed to create presigning config")?;

        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .context("Failed to presign PUT URL")?;

        Ok(presigned.uri().to_string())
    }
}
