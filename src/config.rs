//! Server and client configuration
//!
//! Both processes take exactly one positional argument; everything else is a
//! compiled-in default.

use std::path::PathBuf;

use crate::error::AppError;

/// Credential file written next to the server's working directory
pub const DEFAULT_DATA_FILE: &str = "database.txt";

/// Maximum number of users logged in at the same time
pub const DEFAULT_MAX_ONLINE: usize = 30;

/// Maximum number of registered users
pub const DEFAULT_MAX_REGISTERED: usize = 500;

/// Size of the buffer a single read fills
pub const READ_BUFFER_SIZE: usize = 1024;

/// Channel buffer size for per-connection queues
pub const CONNECTION_QUEUE_SIZE: usize = 32;

/// Channel buffer size for the router mailbox and the reaper queue
pub const MAILBOX_SIZE: usize = 256;

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (0 picks a free port)
    pub port: u16,
    /// Credential file path
    pub data_file: PathBuf,
    /// Connection registry capacity
    pub max_online: usize,
    /// Credential store capacity
    pub max_registered: usize,
    /// Bytes read per frame at most
    pub read_buffer: usize,
    /// Inbound/outbound queue size per connection
    pub queue_size: usize,
    /// Router mailbox and reaper queue size
    pub mailbox_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            max_online: DEFAULT_MAX_ONLINE,
            max_registered: DEFAULT_MAX_REGISTERED,
            read_buffer: READ_BUFFER_SIZE,
            queue_size: CONNECTION_QUEUE_SIZE,
            mailbox_size: MAILBOX_SIZE,
        }
    }
}

impl ServerConfig {
    /// Build from `std::env::args()`: `chat_room <port>`
    pub fn from_args<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let [_, port] = args.as_slice() else {
            return Err(AppError::Usage("chat_room <port>".to_string()));
        };
        let port = port
            .parse()
            .map_err(|_| AppError::Usage(format!("invalid port {port:?}")))?;

        Ok(Self {
            port,
            ..Self::default()
        })
    }

    /// Address the listener binds to
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the server
    pub server_addr: String,
    pub read_buffer: usize,
    pub queue_size: usize,
}

impl ClientConfig {
    /// Build from `std::env::args()`: `chat_client <host:port>`
    pub fn from_args<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let [_, server_addr] = args.as_slice() else {
            return Err(AppError::Usage("chat_client <host:port>".to_string()));
        };

        Ok(Self {
            server_addr: server_addr.clone(),
            read_buffer: READ_BUFFER_SIZE,
            queue_size: CONNECTION_QUEUE_SIZE,
        })
    }
}
