use std::{
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use lapin::{
    message::Delivery, options::*, types::FieldTable, BasicProperties, Channel, Connection,
    ConnectionProperties, Consumer,
};
use nanoid::nanoid;
use pin_project::pin_project;
use tracing::{debug, info, instrument};

use crate::{common::Acker, config::ConnectionParams, error::*, topology::Topology};

pub type AmqpProperties = BasicProperties;

/// How deliveries are acknowledged to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// The broker considers a message acknowledged as soon as it is sent. Whatever happens in
    /// the handler afterwards, the message will not be redelivered.
    Auto,
    /// The message is acknowledged once the handler returns successfully, and requeued when it
    /// fails.
    Manual,
}

impl Default for AckMode {
    fn default() -> Self {
        AckMode::Auto
    }
}

#[async_trait]
impl Acker for Weak<Channel> {
    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        match self.upgrade() {
            Some(channel) => Ok(channel
                .basic_ack(delivery_tag, BasicAckOptions::default())
                .await?),
            None => Ok(()),
        }
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        match self.upgrade() {
            Some(channel) => Ok(channel
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        multiple: false,
                        requeue,
                    },
                )
                .await?),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub acker: Arc<dyn Acker>,
    pub data: Bytes,
    pub properties: BasicProperties,
    pub delivery_tag: u64,
    pub routing_key: String,
    pub exchange: String,
    pub redelivered: bool,
}

impl From<(Weak<Channel>, Delivery)> for Message {
    fn from(data: (Weak<Channel>, Delivery)) -> Self {
        Self {
            acker: Arc::new(data.0),
            data: Bytes::from(data.1.data),
            properties: data.1.properties,
            delivery_tag: data.1.delivery_tag,
            routing_key: data.1.routing_key.to_string(),
            exchange: data.1.exchange.to_string(),
            redelivered: data.1.redelivered,
        }
    }
}

impl Message {
    /// A message that is not attached to any channel. Acknowledging it does nothing.
    pub fn detached(data: impl Into<Bytes>) -> Self {
        Self {
            acker: Arc::new(Weak::<Channel>::new()),
            data: data.into(),
            properties: BasicProperties::default(),
            delivery_tag: 0,
            routing_key: String::new(),
            exchange: String::new(),
            redelivered: false,
        }
    }

    pub async fn ack(&self) -> Result<()> {
        self.acker.ack(self.delivery_tag).await
    }

    pub async fn nack(&self, requeue: bool) -> Result<()> {
        self.acker.nack(self.delivery_tag, requeue).await
    }
}

/// Messages delivered to a single consumer, in broker order.
#[pin_project]
pub struct Deliveries {
    tag: String,
    channel: Arc<Channel>,
    #[pin]
    consumer: Consumer,
}

impl Deliveries {
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl Stream for Deliveries {
    type Item = Result<Message>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let channel = this.channel;

        this.consumer.poll_next(cx).map(|item| {
            item.map(|delivery| {
                delivery
                    .map(|delivery| (Arc::downgrade(channel), delivery).into())
                    .map_err(Error::from)
            })
        })
    }
}

pub struct AmqpBroker {
    connection: Connection,
    channel: Arc<Channel>,
}

impl AmqpBroker {
    /// Opens a connection and a channel. There is no retry: an unreachable broker, rejected
    /// credentials or an unknown vhost all fail here.
    #[instrument(level = "debug", err)]
    pub async fn connect(params: &ConnectionParams) -> Result<AmqpBroker> {
        let connection =
            Connection::connect_uri(params.to_uri(), ConnectionProperties::default()).await?;
        let channel = Arc::new(connection.create_channel().await?);

        info!(
            host = %params.host,
            port = params.port,
            vhost = %params.vhost,
            "Connected to AMQP broker"
        );

        Ok(Self {
            connection,
            channel,
        })
    }

    pub async fn declare(&self, topology: &Topology) -> Result<()> {
        topology.declare(&self.channel).await
    }

    #[instrument(level = "debug", skip(self, payload, properties), fields(len = payload.len()), err)]
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: AmqpProperties,
    ) -> Result<()> {
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;

        Ok(())
    }

    /// Registers a consumer on `queue`. With [`AckMode::Auto`] the broker is told not to wait for
    /// acknowledgements at all.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn consume(&self, queue: &str, ack_mode: AckMode) -> Result<Deliveries> {
        let tag = format!("conejo-{}", nanoid!());
        let consumer = self
            .channel
            .basic_consume(
                queue,
                &tag,
                BasicConsumeOptions {
                    no_ack: ack_mode == AckMode::Auto,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        debug!(%tag, "consumer registered");

        Ok(Deliveries {
            tag,
            channel: Arc::clone(&self.channel),
            consumer,
        })
    }

    /// Deletes `queue` and returns how many messages it still held.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn delete_queue(&self, queue: &str) -> Result<u32> {
        Ok(self
            .channel
            .queue_delete(queue, QueueDeleteOptions::default())
            .await?)
    }

    pub async fn close(&self) -> Result<()> {
        Ok(self.connection.close(200, "Bye").await?)
    }
}

impl std::fmt::Debug for AmqpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpBroker")
            .field("state", &self.connection.status().state())
            .field("channel", &self.channel.id())
            .finish()
    }
}
