use clap::Parser;
use login::network::LoginServer;
use shared::services::{MemoryCredentialStore, MemoryDirectory};
use std::sync::Arc;

/// Login tier entry point: parses arguments, seeds the in-memory credential
/// store and runs the accept loop until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[clap(short, long, default_value = "3724")]
        port: u16,
        /// Seed account in user:password form (repeatable)
        #[clap(short, long)]
        account: Vec<String>,
    }

    env_logger::init();
    let args = Args::parse();

    let store = Arc::new(MemoryCredentialStore::new());
    for entry in &args.account {
        match entry.split_once(':') {
            Some((user, pass)) => store.register(user, pass).await,
            None => log::warn!("ignoring malformed --account value {:?}", entry),
        }
    }

    // Stand-in for the remote directory service; the gateway tier reaches
    // the same directory through its own service boundary.
    let directory = Arc::new(MemoryDirectory::new());

    let addr = format!("{}:{}", args.host, args.port);
    let server = LoginServer::bind(&addr, store, directory).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
