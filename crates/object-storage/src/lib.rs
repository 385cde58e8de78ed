//! S3-compatible object storage client used by the workers. Ingestion reads
//! user uploads; the podcast generator writes finished audio.

use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use config::StorageConfig;
use secrecy::ExposeSecret;
use thiserror::Error;

/// Object storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object could not be fetched.
    #[error("failed to fetch object '{key}': {message}")]
    Get { key: String, message: String },

    /// The object could not be written.
    #[error("failed to store object '{key}': {message}")]
    Put { key: String, message: String },
}

/// A thin wrapper around the S3 client bound to the two fylr buckets.
#[derive(Clone)]
pub struct ObjectStorage {
    client: aws_sdk_s3::Client,
    source_bucket: String,
    podcast_bucket: String,
}

impl ObjectStorage {
    /// Build a client from configuration. Self-hosted stores require
    /// path-style addressing, so it is always enabled.
    pub async fn new(config: &StorageConfig) -> Self {
        let region = Region::new(config.region.clone());
        let mut config_loader = aws_config::from_env().region(region);

        if let (Some(key_id), Some(secret_key)) = (&config.key_id, &config.secret_key) {
            config_loader = config_loader.credentials_provider(Credentials::new(
                key_id,
                secret_key.expose_secret(),
                None,
                None,
                "fylr_storage",
            ));
        }

        let mut sdk_config = config_loader.load().await;

        if let Some(endpoint) = &config.endpoint {
            log::debug!("Using custom object storage endpoint: {endpoint}");
            sdk_config = sdk_config.into_builder().endpoint_url(endpoint.as_str()).build();
        }

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            source_bucket: config.source_bucket.clone(),
            podcast_bucket: config.podcast_bucket.clone(),
        }
    }

    /// Read a user upload by key.
    pub async fn fetch_source(&self, key: &str) -> Result<Bytes, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.source_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Get {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let data = response.body.collect().await.map_err(|e| StorageError::Get {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(data.into_bytes())
    }

    /// Write generated podcast audio under the given key.
    pub async fn store_podcast_audio(&self, key: &str, audio: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.podcast_bucket)
            .key(key)
            .content_type("audio/wav")
            .body(ByteStream::from(audio))
            .send()
            .await
            .map_err(|e| StorageError::Put {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}
