use lapin::{
    Channel, ExchangeKind,
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
};

use crate::{DEAD_LETTER_EXCHANGE, EVENTS_EXCHANGE, FILE_EXCHANGE};

/// Declare the three durable exchanges every worker relies on.
pub async fn declare_exchanges(channel: &Channel) -> lapin::Result<()> {
    let durable = ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    };

    channel
        .exchange_declare(FILE_EXCHANGE, ExchangeKind::Topic, durable, FieldTable::default())
        .await?;

    channel
        .exchange_declare(EVENTS_EXCHANGE, ExchangeKind::Topic, durable, FieldTable::default())
        .await?;

    channel
        .exchange_declare(DEAD_LETTER_EXCHANGE, ExchangeKind::Direct, durable, FieldTable::default())
        .await?;

    Ok(())
}

/// Declare `<queue>.dlq` and bind it to the dead-letter exchange under the
/// given routing key, for offline inspection of poison messages.
pub async fn declare_dlq(channel: &Channel, queue: &str, routing_key: &str) -> lapin::Result<()> {
    let dlq = format!("{queue}.dlq");

    channel
        .queue_declare(
            &dlq,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            &dlq,
            DEAD_LETTER_EXCHANGE,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    Ok(())
}

/// Declare a durable generator queue dead-lettering into the fylr-dlx under
/// its own name, with its DLQ. Producers publish to these queues directly,
/// so no exchange binding is needed.
pub async fn declare_job_queue(channel: &Channel, queue: &str) -> lapin::Result<()> {
    declare_dlq(channel, queue, queue).await?;

    let mut arguments = FieldTable::default();
    arguments.insert("x-dead-letter-exchange".into(), AMQPValue::LongString(DEAD_LETTER_EXCHANGE.into()));
    arguments.insert("x-dead-letter-routing-key".into(), AMQPValue::LongString(queue.into()));

    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            arguments,
        )
        .await?;

    log::debug!("Declared queue '{queue}' with DLQ support");

    Ok(())
}

/// Declare a durable worker queue dead-lettering into the fylr-dlx, with its
/// DLQ, bound to the given exchange under each routing key.
pub async fn declare_worker_queue(
    channel: &Channel,
    queue: &str,
    exchange: &str,
    routing_keys: &[String],
) -> lapin::Result<()> {
    let dead_letter_key = routing_keys.first().map(String::as_str).unwrap_or(queue);

    declare_dlq(channel, queue, dead_letter_key).await?;

    let mut arguments = FieldTable::default();
    arguments.insert("x-dead-letter-exchange".into(), AMQPValue::LongString(DEAD_LETTER_EXCHANGE.into()));
    arguments.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(dead_letter_key.into()),
    );

    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            arguments,
        )
        .await?;

    for routing_key in routing_keys {
        channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        log::debug!("Bound queue '{queue}' to routing key '{routing_key}' on '{exchange}'");
    }

    Ok(())
}
