//! Multi-user TCP Chat Room Library
//!
//! A chat room server with registration, login, private messages and an
//! administrator console, speaking a minimal `-` delimited text protocol.
//!
//! # Features
//! - Registration and login against a JSON credential file
//! - Broadcast chat and private (`To-`) messages
//! - Online user list on login, join/leave notices
//! - Admin console: direct message, broadcast, mute, kick
//! - Capacity limits on online and registered users
//!
//! # Architecture
//! Actor tasks fed by `mpsc` channels:
//! - Each connection has a read task and a write task (`transport`)
//! - `Authenticator` drives a connection until it logs in, after which
//!   `handler::forward_inbound` relays its frames to the router mailbox
//! - `MessageRouter` is the single consumer of the mailbox
//! - `DisconnectReaper` cleans up after dropped connections
//! - `ConnectionRegistry` is the only shared map, behind a mutex
//!
//! # Example
//! ```ignore
//! use chat_room::{ChatServer, CredentialStore, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig { port: 9000, ..ServerConfig::default() };
//!     let store = CredentialStore::load(&config.data_file, config.max_registered).await.unwrap();
//!     let server = ChatServer::bind(config, store).await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod admin;
pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handler;
pub mod message;
pub mod reaper;
pub mod registry;
pub mod router;
pub mod server;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use admin::AdminConsole;
pub use auth::{Authenticator, Session, SessionState};
pub use client::ChatSession;
pub use config::{ClientConfig, ServerConfig};
pub use credentials::{CredentialRecord, CredentialStore};
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{AuthRequest, RoutingRequest};
pub use reaper::DisconnectReaper;
pub use registry::{ConnectionEntry, ConnectionRegistry};
pub use router::{Mailbox, MessageRouter};
pub use server::{ChatServer, ServerContext};
pub use types::{AccessLevel, ConnectionClosed, SocketHandle};
