use clap::Parser;
use gateway::network::{GatewayConfig, GatewayServer};
use shared::services::{MemoryCharacterService, MemoryDirectory};
use std::sync::Arc;
use std::time::Duration;

/// Gateway tier entry point: parses arguments, wires the collaborator
/// services and runs the accept loop until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[clap(short, long, default_value = "8085")]
        port: u16,
        /// Maximum connections admitted into the world (0 = unlimited)
        #[clap(short = 'c', long, default_value = "0")]
        world_capacity: usize,
        /// Client build to accept (repeatable; none accepts any)
        #[clap(short = 'b', long)]
        allowed_build: Vec<u32>,
        /// Session key directory round-trip budget, in seconds
        #[clap(short = 't', long, default_value = "10")]
        directory_timeout_secs: u64,
    }

    env_logger::init();
    let args = Args::parse();

    // Stand-ins for the remote directory and character services; production
    // deployments point these at the real backends.
    let directory = Arc::new(MemoryDirectory::new());
    let characters = Arc::new(MemoryCharacterService::new());

    let config = GatewayConfig {
        world_capacity: args.world_capacity,
        allowed_builds: args.allowed_build,
        directory_timeout: Duration::from_secs(args.directory_timeout_secs),
    };

    let addr = format!("{}:{}", args.host, args.port);
    let server = GatewayServer::bind(&addr, directory, characters, config).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
