//! The re-ingestion worker: recomputes embeddings for an already-ingested
//! source with a new target model, reusing the stored chunk text. Vectors
//! are updated in place in one transaction.

use broker::{StatusEvent, StatusPublisher};
use config::Config;
use db::SourceStatus;
use futures::StreamExt;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use pgvector::Vector;
use serde::Deserialize;
use sqlx::PgPool;

use crate::{client::GatewayClient, worker::IngestError};

const REINGEST_COMPLETED: &str = "COMPLETED";

/// The re-ingestion message body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReingestMessage {
    pub source_id: String,
    pub job_key: String,
    pub target_embedding_model: String,
}

impl ReingestMessage {
    pub fn parse(body: &[u8]) -> Result<ReingestMessage, IngestError> {
        serde_json::from_slice(body).map_err(|e| IngestError::InvalidMessage(e.to_string()))
    }
}

/// Run the re-ingestion worker until the consumer stream closes.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.database).await?;
    let gateway = GatewayClient::new(config.gateway.url.clone());

    let connection = broker::connect(&config.broker).await?;
    let channel = broker::worker_channel(&connection).await?;

    broker::declare_exchanges(&channel).await?;
    broker::declare_worker_queue(
        &channel,
        &config.ingestor.reingest_queue,
        broker::FILE_EXCHANGE,
        std::slice::from_ref(&config.ingestor.reingest_routing_key),
    )
    .await?;

    let publisher = StatusPublisher::new(channel.clone(), config.broker.blocked_connection_timeout);

    let mut consumer = channel
        .basic_consume(
            &config.ingestor.reingest_queue,
            "file-reingestor",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    log::info!(
        "Re-ingestor online. Listening on queue '{}'",
        config.ingestor.reingest_queue
    );

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                log::error!("Consumer error: {e}");
                continue;
            }
        };

        let message = match ReingestMessage::parse(&delivery.data) {
            Ok(message) => message,
            Err(e) => {
                log::error!("Rejecting poison message: {e}");
                broker::reject_checked(&channel, delivery.delivery_tag).await;
                continue;
            }
        };

        match process(&message, &pool, &gateway, &publisher).await {
            Ok(Outcome::Completed) => {
                publisher
                    .job_status(
                        &message.job_key,
                        &StatusEvent::new("COMPLETED", "Processing finished successfully."),
                    )
                    .await;
                broker::ack_checked(&channel, delivery.delivery_tag).await;
            }
            Ok(Outcome::Skipped) => {
                publisher
                    .job_status(
                        &message.job_key,
                        &StatusEvent::new("SKIPPED", "Re-ingestion already completed; skipping."),
                    )
                    .await;
                broker::ack_checked(&channel, delivery.delivery_tag).await;
            }
            Err(e) => {
                log::error!("Error re-ingesting source {}: {e}", message.source_id);
                publisher
                    .job_status(&message.job_key, &StatusEvent::failed("FAILED", e.to_string()))
                    .await;

                if let Err(db_err) = db::mark_reingestion_failed(&pool, &message.source_id).await {
                    log::error!("Failed to mark source {} as FAILED: {db_err}", message.source_id);
                }

                broker::reject_checked(&channel, delivery.delivery_tag).await;
            }
        }
    }

    Ok(())
}

enum Outcome {
    Completed,
    Skipped,
}

async fn process(
    message: &ReingestMessage,
    pool: &PgPool,
    gateway: &GatewayClient,
    publisher: &StatusPublisher,
) -> Result<Outcome, IngestError> {
    let job_key = &message.job_key;

    publisher
        .job_status(job_key, &StatusEvent::new("STARTING_REINGEST", "Re-ingestion started."))
        .await;

    publisher
        .job_status(
            job_key,
            &StatusEvent::new("FETCHING_CHUNKS", "Fetching existing chunks from database."),
        )
        .await;

    let source = db::fetch_source(pool, &message.source_id)
        .await?
        .ok_or_else(|| IngestError::InvalidMessage(format!("Source not found for ID: {}", message.source_id)))?;

    let vectors = db::fetch_source_vectors(pool, &message.source_id).await?;

    if vectors.is_empty() {
        return Err(IngestError::InvalidMessage(format!(
            "No existing vectors found for source ID: {}",
            message.source_id
        )));
    }

    // Idempotency: a redelivered message after a successful run is a no-op.
    if source.reingestion_status.as_deref() == Some(REINGEST_COMPLETED)
        && source.status == SourceStatus::COMPLETED
    {
        return Ok(Outcome::Skipped);
    }

    db::mark_reingestion_started(pool, &message.source_id).await?;

    let chunks: Vec<String> = vectors.iter().map(|v| v.content.clone()).collect();

    publisher
        .job_status(
            job_key,
            &StatusEvent::new("VECTORIZING", format!("Generating embeddings for {} chunks.", chunks.len())),
        )
        .await;

    let embeddings = gateway.embeddings(&chunks, &message.target_embedding_model).await?;

    if embeddings.len() != vectors.len() {
        return Err(IngestError::EmbeddingCountMismatch);
    }

    publisher
        .job_status(job_key, &StatusEvent::new("SAVING", "Updating embeddings in database."))
        .await;

    let vector_ids: Vec<String> = vectors.iter().map(|v| v.id.clone()).collect();
    let embeddings: Vec<Vector> = embeddings.into_iter().map(Vector::from).collect();

    db::update_source_embeddings(pool, &message.source_id, &vector_ids, &embeddings).await?;

    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_requires_the_target_model() {
        let body = serde_json::json!({
            "sourceId": "s1",
            "jobKey": "j1",
        });

        assert!(ReingestMessage::parse(body.to_string().as_bytes()).is_err());

        let body = serde_json::json!({
            "sourceId": "s1",
            "jobKey": "j1",
            "targetEmbeddingModel": "1718236800@2.0@jina/jina-clip-v2",
        });

        let message = ReingestMessage::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(message.target_embedding_model, "1718236800@2.0@jina/jina-clip-v2");
    }
}
