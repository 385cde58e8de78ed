//! The ingestion worker: consumes file-processing messages, runs the
//! fetch → extract → chunk → embed → persist pipeline, and reports every
//! stage to the events exchange.

use broker::{StatusEvent, StatusPublisher};
use config::Config;
use db::NewVector;
use futures::StreamExt;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use pgvector::Vector;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

use crate::{chunker, client::GatewayClient, handlers};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error(transparent)]
    Storage(#[from] object_storage::StorageError),

    #[error(transparent)]
    Handler(#[from] handlers::HandlerError),

    #[error(transparent)]
    Gateway(#[from] crate::client::ClientError),

    #[error("Mismatch between number of chunks and embeddings.")]
    EmbeddingCountMismatch,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The file-processing message body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestMessage {
    pub source_id: String,
    pub s3_key: String,
    pub mime_type: String,
    pub job_key: String,
    pub embedding_model: String,
}

impl IngestMessage {
    /// Parse and validate a message body. Any missing field makes the
    /// message poison; it is rejected without requeue before any stage runs.
    pub fn parse(body: &[u8]) -> Result<IngestMessage, IngestError> {
        serde_json::from_slice(body).map_err(|e| IngestError::InvalidMessage(e.to_string()))
    }
}

/// Run the ingestion worker until the consumer stream closes.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.database).await?;
    let storage = object_storage::ObjectStorage::new(&config.storage).await;
    let gateway = GatewayClient::new(config.gateway.url.clone());

    let connection = broker::connect(&config.broker).await?;
    let channel = broker::worker_channel(&connection).await?;

    broker::declare_exchanges(&channel).await?;
    broker::declare_worker_queue(
        &channel,
        &config.ingestor.queue,
        broker::FILE_EXCHANGE,
        &config.ingestor.routing_keys,
    )
    .await?;

    let publisher = StatusPublisher::new(channel.clone(), config.broker.blocked_connection_timeout);

    let mut consumer = channel
        .basic_consume(
            &config.ingestor.queue,
            "file-ingestor",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    log::info!("Ingestor online. Listening on queue '{}'", config.ingestor.queue);

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                log::error!("Consumer error: {e}");
                continue;
            }
        };

        let message = match IngestMessage::parse(&delivery.data) {
            Ok(message) => message,
            Err(e) => {
                log::error!("Rejecting poison message: {e}");
                broker::reject_checked(&channel, delivery.delivery_tag).await;
                continue;
            }
        };

        let job_key = message.job_key.clone();
        let source_id = message.source_id.clone();

        match process(&message, &pool, &storage, &gateway, &publisher, config).await {
            Ok(()) => {
                publisher
                    .job_status(&job_key, &StatusEvent::new("COMPLETED", "Processing finished successfully."))
                    .await;
                broker::ack_checked(&channel, delivery.delivery_tag).await;
            }
            Err(e) => {
                log::error!("Error processing message for source {source_id}: {e}");
                publisher
                    .job_status(&job_key, &StatusEvent::failed("FAILED", e.to_string()))
                    .await;

                if let Err(db_err) = db::set_source_status(&pool, &source_id, db::SourceStatus::FAILED).await {
                    log::error!("Failed to mark source {source_id} as FAILED: {db_err}");
                }

                broker::reject_checked(&channel, delivery.delivery_tag).await;
            }
        }
    }

    Ok(())
}

async fn process(
    message: &IngestMessage,
    pool: &PgPool,
    storage: &object_storage::ObjectStorage,
    gateway: &GatewayClient,
    publisher: &StatusPublisher,
    config: &Config,
) -> Result<(), IngestError> {
    let job_key = &message.job_key;

    publisher
        .job_status(job_key, &StatusEvent::new("STARTING", "Processing started."))
        .await;

    publisher
        .job_status(job_key, &StatusEvent::new("FETCHING", "Downloading file from storage."))
        .await;
    let buffer = storage.fetch_source(&message.s3_key).await?;

    publisher
        .job_status(
            job_key,
            &StatusEvent::new("PARSING", format!("Parsing {} file.", message.mime_type)),
        )
        .await;
    let text = handlers::extract(&message.mime_type, &buffer)?;

    let chunks = chunker::split_text(&text);
    publisher
        .job_status(
            job_key,
            &StatusEvent::new("VECTORIZING", format!("Split text into {} chunks.", chunks.len())),
        )
        .await;

    let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = gateway.embeddings(&contents, &message.embedding_model).await?;

    if embeddings.len() != chunks.len() {
        return Err(IngestError::EmbeddingCountMismatch);
    }

    publisher
        .job_status(job_key, &StatusEvent::new("SAVING", "Saving vectors to the database."))
        .await;

    let vectors: Vec<NewVector> = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| NewVector {
            content: chunk.content,
            embedding: Vector::from(embedding),
            chunk_index: chunk.start_index as i32,
        })
        .collect();

    let saved = db::replace_source_vectors(
        pool,
        &message.source_id,
        &vectors,
        &config.ingestor.ingestor_type,
        &config.ingestor.ingestor_version,
    )
    .await?;

    publisher
        .job_status(
            job_key,
            &StatusEvent::new("SAVING", format!("Saved {saved} vectors."))
                .with("saved_vectors", json!(saved)),
        )
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_parses_with_all_fields() {
        let body = serde_json::json!({
            "sourceId": "s1",
            "s3Key": "k1",
            "mimeType": "text/markdown",
            "jobKey": "j1",
            "embeddingModel": "1718236800@2.0@jina/jina-clip-v2",
        });

        let message = IngestMessage::parse(body.to_string().as_bytes()).unwrap();

        assert_eq!(message.source_id, "s1");
        assert_eq!(message.mime_type, "text/markdown");
    }

    #[test]
    fn missing_fields_make_a_message_poison() {
        let err = IngestMessage::parse(b"{}").unwrap_err();
        assert!(matches!(err, IngestError::InvalidMessage(_)));

        let err = IngestMessage::parse(b"not json").unwrap_err();
        assert!(matches!(err, IngestError::InvalidMessage(_)));
    }
}
