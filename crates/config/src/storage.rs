use std::fmt;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// S3-compatible object storage settings. Path-style addressing is always
/// used so self-hosted stores like garage or MinIO work out of the box.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Endpoint URL of the object store.
    pub endpoint: Option<Url>,
    /// Region name. Self-hosted stores accept an arbitrary value.
    pub region: String,
    /// Access key id.
    pub key_id: Option<String>,
    /// Secret access key.
    pub secret_key: Option<SecretString>,
    /// Bucket holding user uploads, read by the ingestion workers.
    pub source_bucket: String,
    /// Bucket receiving generated podcast audio.
    pub podcast_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "garage".to_string(),
            key_id: None,
            secret_key: None,
            source_bucket: "fylr.chat-sources".to_string(),
            podcast_bucket: "fylr.chat-podcasts".to_string(),
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("key_id", &self.key_id)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("source_bucket", &self.source_bucket)
            .field("podcast_bucket", &self.podcast_bucket)
            .finish()
    }
}
