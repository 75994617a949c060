//! Basic type definitions for the chat room
//!
//! - `AccessLevel`: privilege level stored with each credential record
//! - `ConnectionClosed`: single-fire notification of a dead transport
//! - `SocketHandle`: cloneable handle that closes a connection's socket

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Access level of a registered user (newtype pattern)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessLevel(pub i32);

impl AccessLevel {
    /// Level given to every user created through registration
    pub const USER: AccessLevel = AccessLevel(1);
}

impl Default for AccessLevel {
    fn default() -> Self {
        Self::USER
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sent to the disconnect reaper when a connection's transport fails
///
/// The peer address is the connection's identity; the pump never knows
/// which user is logged in on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionClosed {
    pub addr: SocketAddr,
}

/// Handle to a connection's socket
///
/// Closing it cancels both pump loops and the inbound forwarder, which drop
/// their halves of the stream.
#[derive(Debug, Clone, Default)]
pub struct SocketHandle {
    token: CancellationToken,
}

impl SocketHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the socket. Closing twice is a no-op.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the socket has been closed
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_access_level() {
        assert_eq!(AccessLevel::default(), AccessLevel(1));
    }

    #[test]
    fn test_access_level_serializes_as_integer() {
        let json = serde_json::to_string(&AccessLevel::USER).unwrap();
        assert_eq!(json, "1");
    }

    #[tokio::test]
    async fn test_socket_handle_close_is_shared() {
        let handle = SocketHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_closed());

        handle.close();
        handle.close();

        assert!(clone.is_closed());
        clone.closed().await;
    }
}
