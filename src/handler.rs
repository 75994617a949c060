//! Connection handler
//!
//! Handles individual client connections: starts the transport pump, runs
//! the authentication state machine, then forwards every inbound frame of a
//! logged in user into the router mailbox.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::auth::SessionState;
use crate::registry::ConnectionRegistry;
use crate::router::Mailbox;
use crate::server::ServerContext;
use crate::transport::{self, Transport};

/// Handle a new connection until it closes
pub async fn handle_connection<S>(stream: S, addr: SocketAddr, ctx: ServerContext)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    debug!("New connection from {}", addr);

    let mut transport = transport::spawn(
        stream,
        addr,
        ctx.closed_tx.clone(),
        ctx.config.read_buffer,
        ctx.config.queue_size,
    );

    let session = ctx.authenticator.authenticate(&mut transport).await;
    match (session.state, session.username) {
        (SessionState::Authenticated, Some(username)) => {
            forward_inbound(username, transport, ctx.registry, ctx.mailbox).await;
        }
        (state, _) => {
            debug!("Connection {} ended before login ({:?})", addr, state);
        }
    }
}

/// Relay a logged in user's frames into the router mailbox
///
/// Empty frames are dropped. Stops when the socket closes or when this
/// connection no longer owns `username` in the registry (kicked or reaped).
pub async fn forward_inbound(
    username: String,
    mut transport: Transport,
    registry: Arc<ConnectionRegistry>,
    mailbox: Mailbox,
) {
    let addr = transport.addr;

    loop {
        let frame = tokio::select! {
            _ = transport.socket.closed() => break,
            frame = transport.inbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if registry.username_at(addr).as_deref() != Some(username.as_str()) {
            break;
        }
        if frame.is_empty() {
            continue;
        }
        if mailbox.send(frame).await.is_err() {
            debug!("Router closed, ending forwarder for {}", username);
            break;
        }
    }

    info!("Stopped forwarding frames from {} ({})", username, addr);
}
