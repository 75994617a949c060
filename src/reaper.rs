//! Disconnect reaper actor
//!
//! Consumes connection-closed notifications from the transport pumps and
//! removes the departed user from the registry.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::left_notice;
use crate::registry::ConnectionRegistry;
use crate::router::Mailbox;
use crate::types::ConnectionClosed;

/// The disconnect reaper actor
pub struct DisconnectReaper {
    registry: Arc<ConnectionRegistry>,
    mailbox: Mailbox,
    receiver: mpsc::Receiver<ConnectionClosed>,
}

impl DisconnectReaper {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        mailbox: Mailbox,
        receiver: mpsc::Receiver<ConnectionClosed>,
    ) -> Self {
        Self {
            registry,
            mailbox,
            receiver,
        }
    }

    /// Run the reaper event loop until every pump has dropped its sender
    pub async fn run(mut self) {
        info!("Disconnect reaper started");

        while let Some(ConnectionClosed { addr }) = self.receiver.recv().await {
            self.reap(addr).await;
        }

        info!("Disconnect reaper shutting down");
    }

    /// Clean up whoever was logged in from `addr`
    ///
    /// Returns the removed username. Connections that never logged in, or
    /// were already removed (kicked, reaped before), are a no-op.
    pub async fn reap(&self, addr: SocketAddr) -> Option<String> {
        let Some(entry) = self.registry.remove_by_addr(addr) else {
            debug!("Connection {} has no logged in user", addr);
            return None;
        };

        info!("User {} disconnected ({})", entry.username, addr);
        let _ = self.mailbox.send(left_notice(&entry.username)).await;
        entry.socket.close();

        Some(entry.username)
    }
}
