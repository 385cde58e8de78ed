//! Shared message lifecycle for the generator workers: decode the entity id
//! from the message body, delegate to the generator, and settle the message.
//! All publishes and acks check channel liveness first, since a long LLM or
//! TTS call can outlast the broker heartbeat.

use std::sync::Arc;

use async_trait::async_trait;
use broker::StatusPublisher;
use config::Config;
use futures::StreamExt;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use sqlx::PgPool;
use uuid::Uuid;

use crate::client::GatewayClient;

/// Everything a generator needs to do its work.
pub struct GeneratorContext {
    pub pool: PgPool,
    pub storage: object_storage::ObjectStorage,
    pub gateway: GatewayClient,
    pub publisher: StatusPublisher,
    pub config: config::GeneratorConfig,
}

/// One derived-artifact generator, consuming its own queue.
#[async_trait]
pub trait Generator: Send + Sync {
    /// The entity type used in status routing keys.
    fn entity_type(&self) -> &'static str;

    /// The queue this generator consumes. Routed by queue name, with
    /// `<queue>.dlq` receiving rejected messages.
    fn queue(&self) -> &'static str;

    /// Produce the artifact for one entity. Any error fails the message;
    /// the lifecycle nacks it without requeue.
    async fn create(&self, ctx: &GeneratorContext, entity_id: &str) -> anyhow::Result<()>;
}

/// Decode a message body: a JSON-encoded UUID string.
pub fn parse_entity_id(body: &[u8]) -> Result<String, String> {
    let id: String = serde_json::from_slice(body)
        .map_err(|e| format!("expecting a JSON-serialized UUID string: {e}"))?;

    Uuid::parse_str(&id).map_err(|e| format!("'{id}' is not a UUID: {e}"))?;

    Ok(id)
}

/// Run all generators against the broker until their consumers close.
pub async fn run(config: &Config, generators: Vec<Arc<dyn Generator>>) -> anyhow::Result<()> {
    let pool = db::connect(&config.database).await?;
    let storage = object_storage::ObjectStorage::new(&config.storage).await;
    let gateway = GatewayClient::new(config.gateway.url.clone());

    let connection = broker::connect(&config.broker).await?;

    let mut tasks = Vec::new();

    for generator in generators {
        let channel = broker::worker_channel(&connection).await?;

        broker::declare_exchanges(&channel).await?;
        broker::declare_job_queue(&channel, generator.queue()).await?;

        let ctx = GeneratorContext {
            pool: pool.clone(),
            storage: storage.clone(),
            gateway: gateway.clone(),
            publisher: StatusPublisher::new(channel.clone(), config.broker.blocked_connection_timeout),
            config: config.generator.clone(),
        };

        tasks.push(tokio::spawn(consume(channel, generator, ctx)));
    }

    log::info!("Generator service online. Waiting for messages.");

    for task in tasks {
        task.await??;
    }

    Ok(())
}

async fn consume(
    channel: lapin::Channel,
    generator: Arc<dyn Generator>,
    ctx: GeneratorContext,
) -> anyhow::Result<()> {
    let mut consumer = channel
        .basic_consume(
            generator.queue(),
            &format!("{}-generator", generator.entity_type()),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    log::info!("Consuming queue '{}'", generator.queue());

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                log::error!("Consumer error on '{}': {e}", generator.queue());
                continue;
            }
        };

        let entity_id = match parse_entity_id(&delivery.data) {
            Ok(entity_id) => entity_id,
            Err(e) => {
                log::error!("Invalid message body on '{}': {e}", generator.queue());
                broker::reject_checked(&channel, delivery.delivery_tag).await;
                continue;
            }
        };

        log::info!("Processing {} request for ID: {entity_id}", generator.entity_type());

        match generator.create(&ctx, &entity_id).await {
            Ok(()) => {
                log::info!(
                    "Successfully processed {} ID: {entity_id}",
                    generator.entity_type()
                );
                broker::ack_checked(&channel, delivery.delivery_tag).await;
            }
            Err(e) => {
                log::error!(
                    "Error during {} processing for ID {entity_id}: {e:#}",
                    generator.entity_type()
                );
                broker::reject_checked(&channel, delivery.delivery_tag).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_must_be_a_json_encoded_uuid() {
        let id = "a3b8f0c2-9d1e-4f5a-8b7c-6d5e4f3a2b1c";
        let body = serde_json::to_vec(&id).unwrap();

        assert_eq!(parse_entity_id(&body).unwrap(), id);

        // A bare (unquoted) string is not valid JSON.
        assert!(parse_entity_id(id.as_bytes()).is_err());
        // A JSON string that is not a UUID fails validation.
        assert!(parse_entity_id(b"\"not-a-uuid\"").is_err());
    }
}
