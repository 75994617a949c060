//! Chat room server - Entry Point
//!
//! Loads the credential file, binds the listener, starts the admin console
//! on stdin and accepts connections.

use std::env;

use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_room::{ChatServer, CredentialStore, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_room=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_room=info")),
        )
        .init();

    let config = ServerConfig::from_args(env::args())?;

    let credentials = CredentialStore::load(&config.data_file, config.max_registered).await?;
    let server = ChatServer::bind(config, credentials).await?;
    info!("Chat server started on {}", server.local_addr()?);

    // Admin console on the server's terminal
    let console = server.admin_console();
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = console.run(stdin, tokio::io::stdout()).await {
            error!("Admin console stopped: {}", e);
        }
    });

    server.run().await;
    Ok(())
}
