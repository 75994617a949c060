//! Error types for the chat room
//!
//! Defines application-level errors and outbound delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (startup failure, broken internal channels) and
/// rejections that are answered with plain text on the offending connection.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal at startup, teardown mid-session)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential file serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// The connection closed while its request was being handled
    #[error("Connection closed")]
    Disconnected,

    /// Wrong command line arguments
    #[error("Usage: {0}")]
    Usage(String),

    /// Auth frame without the expected `{intent}-{username}-{password}` shape
    #[error("Malformed auth frame: {0:?}")]
    MalformedAuthFrame(String),

    /// Unknown username or wrong password
    #[error("Bad credentials")]
    BadCredentials,

    /// A connection entry already exists for this username
    #[error("Already online: {0}")]
    AlreadyOnline(String),

    /// The registry holds the maximum number of online users
    #[error("Room is full")]
    RoomFull,

    /// Registration of a username that is already stored
    #[error("Username taken: {0}")]
    UsernameTaken(String),

    /// The credential store holds the maximum number of records
    #[error("Registration is full")]
    RegistrationFull,

    /// Admin command addressed a user that is not online
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// Admin login with unknown name or wrong password
    #[error("Bad admin credentials")]
    AdminBadCredentials,
}

impl AppError {
    /// Human readable text sent back to a client for a rejected request
    ///
    /// Clients only compare replies against the success token, so every
    /// rejection is just displayed verbatim on the other side.
    pub fn reply_text(&self) -> String {
        match self {
            AppError::RoomFull => "The chat room is full, please try again later".to_string(),
            AppError::BadCredentials => "Wrong username or password!".to_string(),
            AppError::AlreadyOnline(_) => "User is already logged in!".to_string(),
            AppError::UsernameTaken(_) => {
                "Username already exists, please choose another one!".to_string()
            }
            AppError::RegistrationFull => "Registration limit reached!".to_string(),
            AppError::MalformedAuthFrame(_) => "Invalid request format!".to_string(),
            AppError::UnknownUser(_) => "No such user!".to_string(),
            AppError::AdminBadCredentials => "Wrong admin name or password!".to_string(),
            // Fatal errors are not typically converted (connection closes)
            _ => "Internal error".to_string(),
        }
    }

    /// Whether this error is an ordinary rejection rather than a failure
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            AppError::Io(_)
                | AppError::Json(_)
                | AppError::ChannelSend
                | AppError::Disconnected
                | AppError::Usage(_)
        )
    }
}

/// Message send errors
///
/// Occurs when attempting to send frames through closed queues.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
