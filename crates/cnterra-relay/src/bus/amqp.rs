//! AMQP 0-9-1 implementation of the bus handle, plus broker bootstrap.

use async_trait::async_trait;
use lapin::options::{
    BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    QueueDeleteOptions,
};
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio_stream::StreamExt;
use tracing::{debug, info};

use cnterra_core::config::BusConfig;

use super::{BusError, Deliveries, MessageBus};

/// A broker connection with the single channel every session shares.
///
/// `lapin::Channel` serialises its own frames, but the relay still only uses
/// it from one session at a time.
pub struct AmqpBus {
    connection: Connection,
    channel: Channel,
}

impl AmqpBus {
    /// Connect to the broker and open the shared channel.
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let connection = Connection::connect_uri(amqp_uri(config), ConnectionProperties::default())
            .await
            .map_err(|e| BusError::Connection(format!("connecting to {config}: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(format!("opening channel: {e}")))?;

        info!(broker = %config, channel = channel.id(), "Connected to message bus");
        Ok(Self {
            connection,
            channel,
        })
    }

    /// Declare the durable topic exchange the node data is published on.
    pub async fn declare_exchange(&self, exchange: &str) -> Result<(), BusError> {
        self.channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Declare(format!("exchange '{exchange}': {e}")))?;

        info!(exchange = %exchange, "Exchange declared");
        Ok(())
    }

    /// Close the broker connection.
    pub async fn close(&self) -> Result<(), BusError> {
        self.connection
            .close(200, "relay shutting down")
            .await
            .map_err(|e| BusError::Connection(e.to_string()))
    }
}

#[async_trait]
impl MessageBus for AmqpBus {
    async fn declare_queue(&self) -> Result<String, BusError> {
        let queue = self
            .channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    durable: false,
                    auto_delete: true,
                    exclusive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Declare(e.to_string()))?;
        Ok(queue.name().as_str().to_string())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BusError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Bind(e.to_string()))
    }

    async fn consume(&self, queue: &str) -> Result<Deliveries, BusError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;

        debug!(queue = %queue, consumer_tag = consumer.tag().as_str(), "Consumer registered");
        Ok(Box::pin(StreamExt::map(consumer, |delivery| {
            delivery
                .map(|d| d.data)
                .map_err(|e| BusError::Delivery(e.to_string()))
        })))
    }

    async fn delete_queue(&self, queue: &str) -> Result<(), BusError> {
        self.channel
            .queue_delete(
                queue,
                QueueDeleteOptions {
                    nowait: true,
                    ..QueueDeleteOptions::default()
                },
            )
            .await
            .map(|_| ())
            .map_err(|e| BusError::Delete(e.to_string()))
    }
}

/// Broker URI for `config`. Built structurally so credentials need no
/// percent-encoding.
pub fn amqp_uri(config: &BusConfig) -> AMQPUri {
    AMQPUri {
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        vhost: config.vhost.clone(),
        ..AMQPUri::default()
    }
}
