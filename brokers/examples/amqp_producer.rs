use std::env;

use conejo_brokers::{amqp::AmqpProperties, AmqpBroker, ConnectionParams, Topology};

#[tokio::main]
async fn main() {
    env_logger::init();
    let payload = env::args().nth(1).unwrap_or_else(|| "hello".into());
    let params = ConnectionParams::from_env().expect("Invalid connection parameters");
    let broker = AmqpBroker::connect(&params)
        .await
        .expect("Failed to initialize broker");

    let topology = Topology::default();
    broker
        .declare(&topology)
        .await
        .expect("Failed to declare topology");

    match broker
        .publish(
            &topology.exchange,
            &topology.routing_key,
            payload.as_bytes(),
            AmqpProperties::default(),
        )
        .await
    {
        Ok(_) => println!("Message successfully published."),
        Err(e) => panic!("Failed to publish message: {:?}", e),
    };
}
