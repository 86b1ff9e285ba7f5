#[macro_use]
extern crate log;

use std::process;

use conejo_brokers::{
    dispatch, AckMode, AmqpBroker, ConnectionParams, PrintHandler, Result, Topology,
};

async fn run() -> Result<()> {
    let params = ConnectionParams::from_env()?;
    debug!("Resolved connection parameters: {:?}", params);

    let broker = AmqpBroker::connect(&params).await?;

    let topology = Topology::default();
    broker.declare(&topology).await?;

    let deliveries = broker.consume(&topology.queue, AckMode::Auto).await?;
    println!(" [*] Waiting for logs. To exit press CTRL+C");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for the interrupt signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    dispatch(deliveries, &PrintHandler::stdout(), AckMode::Auto, shutdown).await
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        error!("{}", e);
        process::exit(1);
    }
}
