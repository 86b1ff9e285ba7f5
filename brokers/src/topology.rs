use std::{convert::TryFrom, time::Duration};

use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
    Channel, ExchangeKind,
};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

pub const DEFAULT_EXCHANGE: &str = "test";
pub const DEFAULT_QUEUE: &str = "test";
/// Sent as-is in `x-message-ttl`, which RabbitMQ reads as milliseconds.
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_millis(3600);

const MESSAGE_TTL_ARG: &str = "x-message-ttl";

/// An exchange, a queue, and the binding between them.
#[derive(Debug, Clone)]
pub struct Topology {
    pub exchange: String,
    pub exchange_kind: ExchangeKind,
    pub queue: String,
    pub message_ttl: Option<Duration>,
    pub routing_key: String,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            exchange: DEFAULT_EXCHANGE.into(),
            exchange_kind: ExchangeKind::Direct,
            queue: DEFAULT_QUEUE.into(),
            message_ttl: Some(DEFAULT_MESSAGE_TTL),
            routing_key: String::new(),
        }
    }
}

impl Topology {
    pub fn queue_arguments(&self) -> FieldTable {
        let mut args = FieldTable::default();
        if let Some(ttl) = self.message_ttl {
            let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            args.insert(MESSAGE_TTL_ARG.into(), AMQPValue::LongLongInt(millis));
        }
        args
    }

    /// Declares the exchange, then the queue, then binds them. Every step is idempotent on the
    /// broker side as long as the existing objects were declared with the same parameters.
    #[instrument(level = "debug", skip(channel), err)]
    pub async fn declare(&self, channel: &Channel) -> Result<()> {
        channel
            .exchange_declare(
                &self.exchange,
                self.exchange_kind.clone(),
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| Error::Topology {
                object: "exchange",
                name: self.exchange.clone(),
                source,
            })?;
        debug!(exchange = %self.exchange, "exchange declared");

        let queue = channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions::default(),
                self.queue_arguments(),
            )
            .await
            .map_err(|source| Error::Topology {
                object: "queue",
                name: self.queue.clone(),
                source,
            })?;
        debug!(
            queue = %self.queue,
            messages = queue.message_count(),
            consumers = queue.consumer_count(),
            "queue declared"
        );

        channel
            .queue_bind(
                &self.queue,
                &self.exchange,
                &self.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| Error::Topology {
                object: "binding",
                name: format!("{} -> {}", self.exchange, self.queue),
                source,
            })?;
        debug!(
            exchange = %self.exchange,
            queue = %self.queue,
            routing_key = %self.routing_key,
            "queue bound"
        );

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use lapin::types::ShortString;

    use super::*;

    #[test]
    fn default_topology() {
        let topology = Topology::default();

        assert_eq!(topology.exchange, "test");
        assert!(matches!(topology.exchange_kind, ExchangeKind::Direct));
        assert_eq!(topology.queue, "test");
        assert_eq!(topology.message_ttl, Some(Duration::from_millis(3600)));
        assert_eq!(topology.routing_key, "");
    }

    #[test]
    fn ttl_argument_in_milliseconds() {
        let args = Topology::default().queue_arguments();

        assert_eq!(args.inner().len(), 1);
        assert_eq!(
            args.inner().get(&ShortString::from(MESSAGE_TTL_ARG)),
            Some(&AMQPValue::LongLongInt(3600))
        );

        let args = Topology {
            message_ttl: Some(Duration::from_secs(60)),
            ..Default::default()
        }
        .queue_arguments();
        assert_eq!(
            args.inner().get(&ShortString::from(MESSAGE_TTL_ARG)),
            Some(&AMQPValue::LongLongInt(60_000))
        );
    }

    #[test]
    fn no_arguments_without_ttl() {
        let args = Topology {
            message_ttl: None,
            ..Default::default()
        }
        .queue_arguments();

        assert!(args.inner().is_empty());
    }
}
