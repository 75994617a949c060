//! Chat client session state
//!
//! Builds the frames a client sends and tracks whether the administrator has
//! muted it. Terminal I/O lives in the `chat_client` binary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::message::{chat_line, AuthIntent, AuthRequest, RoutingRequest, SHIELD_COMMAND};

/// Printed instead of sending once the client has been muted
pub const MUTED_NOTICE: &str = "You have been muted by the administrator and cannot speak!";

/// Frame for a login attempt
pub fn login_frame(username: &str, password: &str) -> String {
    auth_frame(AuthIntent::Login, username, password)
}

/// Frame for a registration attempt
pub fn register_frame(username: &str, password: &str) -> String {
    auth_frame(AuthIntent::Register, username, password)
}

fn auth_frame(intent: AuthIntent, username: &str, password: &str) -> String {
    AuthRequest {
        intent,
        username: username.to_string(),
        password: password.to_string(),
    }
    .encode()
}

/// What to do with a line typed in the chat loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Write this frame to the server
    Send(String),
    /// Muted: show `MUTED_NOTICE` and send nothing
    Muted,
    /// Empty input
    Nothing,
}

/// A logged in client
///
/// Clones share the muted flag, so the display task and the input loop
/// see the same state.
#[derive(Debug, Clone)]
pub struct ChatSession {
    username: String,
    muted: Arc<AtomicBool>,
}

impl ChatSession {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            muted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Handle a frame from the server
    ///
    /// Returns the text to display; the mute command is consumed silently.
    pub fn receive(&self, frame: String) -> Option<String> {
        if frame == SHIELD_COMMAND {
            self.muted.store(true, Ordering::Release);
            None
        } else {
            Some(frame)
        }
    }

    /// Broadcast chat line
    pub fn chat(&self, input: &str) -> Outgoing {
        if input.is_empty() {
            return Outgoing::Nothing;
        }
        self.outgoing(chat_line(&self.username, input))
    }

    /// Private message to `target`
    pub fn direct(&self, target: &str, body: &str) -> Outgoing {
        if body.is_empty() {
            return Outgoing::Nothing;
        }
        let request = RoutingRequest::Direct {
            from: self.username.clone(),
            to: target.to_string(),
            body: body.to_string(),
        };
        self.outgoing(request.encode())
    }

    fn outgoing(&self, frame: String) -> Outgoing {
        if self.is_muted() {
            Outgoing::Muted
        } else {
            Outgoing::Send(frame)
        }
    }
}
