use serde::Deserialize;

/// Ingestion worker settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestorConfig {
    /// Queue the ingestion worker consumes from.
    pub queue: String,
    /// Routing keys binding the queue to the file-processing exchange.
    pub routing_keys: Vec<String>,
    /// Queue the re-ingestion worker consumes from.
    pub reingest_queue: String,
    /// Routing key binding the re-ingestion queue.
    pub reingest_routing_key: String,
    /// Stamp written on sources this worker completes.
    pub ingestor_type: String,
    /// Version stamp written on sources this worker completes.
    pub ingestor_version: String,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            queue: "file-processing".to_string(),
            routing_keys: vec!["text.v1".to_string()],
            reingest_queue: "file-reingest".to_string(),
            reingest_routing_key: "reingest.v1".to_string(),
            ingestor_type: "text-rust".to_string(),
            ingestor_version: "1.0.0".to_string(),
        }
    }
}
