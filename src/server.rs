//! Chat server wiring
//!
//! Owns the listener and starts the process-wide singleton tasks: the
//! message router and the disconnect reaper. Every accepted socket gets its
//! own connection handler task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use crate::admin::AdminConsole;
use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::credentials::CredentialStore;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::reaper::DisconnectReaper;
use crate::registry::ConnectionRegistry;
use crate::router::{Mailbox, MessageRouter};
use crate::types::ConnectionClosed;

/// Handles shared by every connection task
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<ConnectionRegistry>,
    pub authenticator: Authenticator,
    /// Router mailbox
    pub mailbox: Mailbox,
    /// Reaper queue
    pub closed_tx: mpsc::Sender<ConnectionClosed>,
}

/// A bound chat server with its router and reaper running
pub struct ChatServer {
    listener: TcpListener,
    ctx: ServerContext,
}

impl ChatServer {
    /// Bind the listener and start the router and reaper tasks
    ///
    /// Must be called inside a tokio runtime.
    pub async fn bind(config: ServerConfig, credentials: CredentialStore) -> Result<Self, AppError> {
        let listener = TcpListener::bind(config.listen_addr()).await?;

        let registry = Arc::new(ConnectionRegistry::new(config.max_online));
        let (mailbox, mailbox_rx) = mpsc::channel(config.mailbox_size);
        let (closed_tx, closed_rx) = mpsc::channel(config.mailbox_size);

        tokio::spawn(MessageRouter::new(registry.clone(), mailbox_rx).run());
        tokio::spawn(DisconnectReaper::new(registry.clone(), mailbox.clone(), closed_rx).run());

        let authenticator = Authenticator::new(
            Arc::new(Mutex::new(credentials)),
            registry.clone(),
            mailbox.clone(),
        );

        Ok(Self {
            listener,
            ctx: ServerContext {
                config: Arc::new(config),
                registry,
                authenticator,
                mailbox,
                closed_tx,
            },
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    /// Admin console producing into this server's mailbox
    pub fn admin_console(&self) -> AdminConsole {
        AdminConsole::new(self.ctx.registry.clone(), self.ctx.mailbox.clone())
    }

    /// Connection accept loop
    ///
    /// Accept errors are logged and skipped; the loop never returns.
    pub async fn run(self) {
        info!(
            "Chat server listening on {}",
            self.listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Client {} connected", addr);
                    tokio::spawn(handle_connection(stream, addr, self.ctx.clone()));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
