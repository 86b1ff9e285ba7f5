use std::fmt::Debug;

use async_trait::async_trait;

use crate::{amqp::Message, error::Result};

/// Callback invoked once for every delivered message. Calls never overlap: the next message is
/// not pulled from the queue until the previous call has returned.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<()>;
}

/// Settles deliveries with whatever they were received from.
#[async_trait]
pub trait Acker: Debug + Send + Sync {
    async fn ack(&self, delivery_tag: u64) -> Result<()>;
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()>;
}
