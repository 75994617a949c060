//! Connection registry
//!
//! Maps each logged in username to its outbound queue and socket, plus the
//! reverse map from peer address to username used for disconnect cleanup.
//! Every operation takes the lock once; it is never held across an await.

use std::collections::HashMap;
use std::net::SocketAddr;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{AppError, SendError};
use crate::types::SocketHandle;

/// A logged in connection
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub username: String,
    /// Peer address of the connection
    pub addr: SocketAddr,
    /// Server -> client frame queue
    pub outbound: mpsc::Sender<String>,
    pub socket: SocketHandle,
}

impl ConnectionEntry {
    pub fn new(
        username: impl Into<String>,
        addr: SocketAddr,
        outbound: mpsc::Sender<String>,
        socket: SocketHandle,
    ) -> Self {
        Self {
            username: username.into(),
            addr,
            outbound,
            socket,
        }
    }

    /// Queue a frame for this connection
    ///
    /// Returns an error if the queue is closed (connection gone).
    pub async fn send(&self, frame: String) -> Result<(), SendError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Logged in users, in login order
    entries: IndexMap<String, ConnectionEntry>,
    /// Peer address -> username
    by_addr: HashMap<SocketAddr, String>,
}

/// Shared registry of logged in connections
#[derive(Debug)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
    max_entries: usize,
}

impl ConnectionRegistry {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            max_entries,
        }
    }

    /// Insert an entry together with its address back-reference
    ///
    /// Checks capacity first, then uniqueness of the username, under the same
    /// lock as the insert so two concurrent logins cannot both succeed.
    pub fn put(&self, entry: ConnectionEntry) -> Result<(), AppError> {
        self.put_with(entry, || ())
    }

    /// Like `put`, but runs `on_insert` before the lock is released
    ///
    /// Nothing can look the entry up until `on_insert` has returned, so a
    /// frame queued there is ahead of anything routed to the new user.
    pub fn put_with<F>(&self, entry: ConnectionEntry, on_insert: F) -> Result<(), AppError>
    where
        F: FnOnce(),
    {
        let mut inner = self.inner.lock();
        if inner.entries.len() >= self.max_entries {
            return Err(AppError::RoomFull);
        }
        if inner.entries.contains_key(&entry.username) {
            return Err(AppError::AlreadyOnline(entry.username));
        }

        inner.by_addr.insert(entry.addr, entry.username.clone());
        inner.entries.insert(entry.username.clone(), entry);
        on_insert();
        debug!("Online users: {}", inner.entries.len());
        Ok(())
    }

    pub fn get(&self, username: &str) -> Option<ConnectionEntry> {
        self.inner.lock().entries.get(username).cloned()
    }

    /// Every logged in connection at this instant
    pub fn entries(&self) -> Vec<ConnectionEntry> {
        self.inner.lock().entries.values().cloned().collect()
    }

    /// Remove a user and its address back-reference
    pub fn remove(&self, username: &str) -> Option<ConnectionEntry> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.shift_remove(username)?;
        if inner.by_addr.get(&entry.addr).map(String::as_str) == Some(username) {
            inner.by_addr.remove(&entry.addr);
        }
        Some(entry)
    }

    /// Remove whichever user is logged in from `addr`
    pub fn remove_by_addr(&self, addr: SocketAddr) -> Option<ConnectionEntry> {
        let mut inner = self.inner.lock();
        let username = inner.by_addr.remove(&addr)?;
        inner.entries.shift_remove(&username)
    }

    /// Username logged in from `addr`, if any
    pub fn username_at(&self, addr: SocketAddr) -> Option<String> {
        self.inner.lock().by_addr.get(&addr).cloned()
    }

    /// Usernames in login order
    pub fn snapshot_usernames(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.inner.lock().entries.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_entries
    }
}
