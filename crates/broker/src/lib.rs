//! AMQP plumbing shared by all fylr workers: connection setup, exchange and
//! queue topology, and the best-effort status-event publisher.

mod events;
mod topology;

pub use events::{StatusEvent, StatusPublisher};
pub use topology::{declare_dlq, declare_exchanges, declare_job_queue, declare_worker_queue};

use config::BrokerConfig;
use lapin::{Channel, Connection, ConnectionProperties, options::BasicQosOptions};

/// The topic exchange ingestion messages are routed through.
pub const FILE_EXCHANGE: &str = "file-processing-exchange";

/// The topic exchange all status events are published to.
pub const EVENTS_EXCHANGE: &str = "fylr-events";

/// The direct exchange rejected messages are dead-lettered through.
pub const DEAD_LETTER_EXCHANGE: &str = "fylr-dlx";

/// Connect to the broker. The heartbeat rides on the URI so lapin negotiates
/// it during the handshake; long LLM and TTS calls must finish inside it.
pub async fn connect(config: &BrokerConfig) -> lapin::Result<Connection> {
    let connection = Connection::connect(
        &config.uri(),
        ConnectionProperties::default().with_connection_name("fylr-worker".into()),
    )
    .await?;

    log::debug!("Connected to broker at {}:{}", config.host, config.port);

    Ok(connection)
}

/// Open a channel with prefetch 1 so one worker does not starve others on
/// long documents.
pub async fn worker_channel(connection: &Connection) -> lapin::Result<Channel> {
    let channel = connection.create_channel().await?;
    channel.basic_qos(1, BasicQosOptions::default()).await?;

    Ok(channel)
}

/// Acknowledge a delivery if the channel is still usable. Long calls can
/// outlast broker heartbeats; a closed channel means the broker will
/// redeliver, so the ack is skipped with a log line instead of erroring.
pub async fn ack_checked(channel: &Channel, delivery_tag: u64) {
    if !channel.status().connected() {
        log::warn!("Channel closed before ack of delivery {delivery_tag}; message may be redelivered");
        return;
    }

    if let Err(e) = channel
        .basic_ack(delivery_tag, lapin::options::BasicAckOptions::default())
        .await
    {
        log::error!("Failed to ack delivery {delivery_tag}: {e}");
    }
}

/// Reject a delivery without requeueing, routing it to the dead-letter
/// queue. Skipped with a log line when the channel has already closed.
pub async fn reject_checked(channel: &Channel, delivery_tag: u64) {
    if !channel.status().connected() {
        log::warn!("Channel closed before nack of delivery {delivery_tag}; message may be redelivered");
        return;
    }

    if let Err(e) = channel
        .basic_nack(
            delivery_tag,
            lapin::options::BasicNackOptions {
                requeue: false,
                ..Default::default()
            },
        )
        .await
    {
        log::error!("Failed to nack delivery {delivery_tag}: {e}");
    }
}
