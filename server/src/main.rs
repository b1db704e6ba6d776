use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::parse();

    info!("Starting server on {}", config.bind_address());
    info!(
        "{} Hz, up to {} clients, {} hole(s), {}s per turn",
        config.tick_rate, config.max_clients, config.holes, config.turn_time
    );

    let mut server = Server::new(&config).await?;
    server.run().await?;

    Ok(())
}
