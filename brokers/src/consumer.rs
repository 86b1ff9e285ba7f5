use std::future::Future;

use futures::Stream;
use tokio_stream::StreamExt;
use tracing::{error, info, trace};

use crate::{
    amqp::{AckMode, Message},
    common::Handler,
    error::{Error, Result},
};

/// Feeds every message from `deliveries` to `handler`, one at a time, until `shutdown`
/// resolves.
///
/// Returns `Ok(())` only when stopped through `shutdown`. A handler error ends the loop and is
/// returned to the caller. With [`AckMode::Auto`] the failed message has already been
/// acknowledged by the broker and is not redelivered; with [`AckMode::Manual`] it is requeued.
pub async fn dispatch<S, H, F>(
    deliveries: S,
    handler: &H,
    ack_mode: AckMode,
    shutdown: F,
) -> Result<()>
where
    S: Stream<Item = Result<Message>>,
    H: Handler + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(deliveries);
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, leaving consume loop");
                return Ok(());
            }
            next = deliveries.next() => match next {
                Some(message) => message?,
                None => return Err(Error::ConsumerClosed),
            },
        };

        trace!(
            delivery_tag = message.delivery_tag,
            routing_key = %message.routing_key,
            len = message.data.len(),
            "message received"
        );

        if let Err(err) = handler.handle(&message).await {
            match ack_mode {
                AckMode::Auto => error!(
                    delivery_tag = message.delivery_tag,
                    "Handler failed on an auto-acknowledged message, it will not be redelivered: {}",
                    err
                ),
                AckMode::Manual => {
                    error!(
                        delivery_tag = message.delivery_tag,
                        "Handler failed, requeueing message: {}", err
                    );
                    if let Err(nack_err) = message.nack(true).await {
                        error!(
                            delivery_tag = message.delivery_tag,
                            "Unable to requeue message: {}", nack_err
                        );
                    }
                }
            }
            return Err(err);
        }

        if ack_mode == AckMode::Manual {
            message.ack().await?;
        }
    }
}
