pub mod amqp;
pub mod common;
pub mod config;
pub mod consumer;
pub mod error;
pub mod print;
pub mod topology;

pub use amqp::{AckMode, AmqpBroker, Message};
pub use common::{Acker, Handler};
pub use config::ConnectionParams;
pub use consumer::dispatch;
pub use error::{Error, Result};
pub use print::PrintHandler;
pub use topology::Topology;
