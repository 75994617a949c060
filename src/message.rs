//! Message protocol definitions
//!
//! Text frames with `-` as the field delimiter. Frames carry no length prefix
//! or terminator: whatever one read returns is one frame. Nothing is escaped,
//! so a username or body containing `-` changes how a frame is routed.

use crate::error::AppError;

/// Field delimiter of every frame
pub const DELIMITER: char = '-';

/// Reply sent to the client when registration or login succeeds
pub const SUCCESS: &str = "success";

/// Command delivered to a user muted by the administrator
pub const SHIELD_COMMAND: &str = "/shield";

/// Sender name used for messages written on the admin console
pub const MANAGER_NAME: &str = "Manager";

/// Header line of the online user list
pub const USER_LIST_HEADER: &str = "Online users:";

/// Intent of a pre-auth frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthIntent {
    /// `Reg-{username}-{password}`
    Register,
    /// `Log-{username}-{password}`
    Login,
}

/// Decoded pre-auth frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub intent: AuthIntent,
    pub username: String,
    pub password: String,
}

impl AuthRequest {
    /// Decode `{intent}-{username}-{password}`
    ///
    /// Only `Reg` selects registration; any other intent is a login attempt.
    /// Fields after the third are ignored.
    pub fn parse(frame: &str) -> Result<Self, AppError> {
        let mut parts = frame.split(DELIMITER);
        let (Some(flag), Some(username), Some(password)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::MalformedAuthFrame(frame.to_string()));
        };

        let intent = if flag == "Reg" {
            AuthIntent::Register
        } else {
            AuthIntent::Login
        };

        Ok(Self {
            intent,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Encode as the frame a client sends
    pub fn encode(&self) -> String {
        let flag = match self.intent {
            AuthIntent::Register => "Reg",
            AuthIntent::Login => "Log",
        };
        format!("{flag}{DELIMITER}{}{DELIMITER}{}", self.username, self.password)
    }
}

/// A frame in the router mailbox, decoded by its part count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingRequest {
    /// 2 parts: `{target}-{command}`, command delivered verbatim
    Command { target: String, command: String },
    /// 3 parts: `List-{target}-{body}`, body delivered verbatim
    List { target: String, body: String },
    /// 4 parts: `To-{from}-{to}-{body}`
    Direct {
        from: String,
        to: String,
        body: String,
    },
    /// Any other part count: the whole frame goes to everyone
    Broadcast(String),
}

impl RoutingRequest {
    /// Decode a frame purely by how many parts the delimiter splits it into
    ///
    /// The leading `List`/`To` tags are never checked.
    pub fn parse(frame: &str) -> Self {
        let parts: Vec<&str> = frame.split(DELIMITER).collect();
        match parts.as_slice() {
            [target, command] => RoutingRequest::Command {
                target: target.to_string(),
                command: command.to_string(),
            },
            [_, target, body] => RoutingRequest::List {
                target: target.to_string(),
                body: body.to_string(),
            },
            [_, from, to, body] => RoutingRequest::Direct {
                from: from.to_string(),
                to: to.to_string(),
                body: body.to_string(),
            },
            _ => RoutingRequest::Broadcast(frame.to_string()),
        }
    }

    /// Encode into a mailbox frame
    pub fn encode(&self) -> String {
        match self {
            RoutingRequest::Command { target, command } => {
                format!("{target}{DELIMITER}{command}")
            }
            RoutingRequest::List { target, body } => {
                format!("List{DELIMITER}{target}{DELIMITER}{body}")
            }
            RoutingRequest::Direct { from, to, body } => {
                format!("To{DELIMITER}{from}{DELIMITER}{to}{DELIMITER}{body}")
            }
            RoutingRequest::Broadcast(text) => text.clone(),
        }
    }

    /// Recipient of a targeted request, `None` for broadcasts
    pub fn target(&self) -> Option<&str> {
        match self {
            RoutingRequest::Command { target, .. } | RoutingRequest::List { target, .. } => {
                Some(target.as_str())
            }
            RoutingRequest::Direct { to, .. } => Some(to.as_str()),
            RoutingRequest::Broadcast(_) => None,
        }
    }

    /// Text that ends up on the recipient's outbound queue
    pub fn delivered_text(&self) -> String {
        match self {
            RoutingRequest::Command { command, .. } => command.clone(),
            RoutingRequest::List { body, .. } => body.clone(),
            RoutingRequest::Direct { from, body, .. } => format!("{from} say to you : {body}"),
            RoutingRequest::Broadcast(text) => text.clone(),
        }
    }
}

/// Plain chat line a logged in client broadcasts
pub fn chat_line(username: &str, body: &str) -> String {
    format!("{username} : {body}")
}

/// Human readable list of online users
pub fn user_list<I, S>(usernames: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut list = USER_LIST_HEADER.to_string();
    for name in usernames {
        list.push_str("\r\n");
        list.push_str(name.as_ref());
    }
    list
}

/// Broadcast notice when a user logs in
pub fn joined_notice(username: &str) -> String {
    format!("User: {username} entered the chat room")
}

/// Broadcast notice when a user's connection drops
pub fn left_notice(username: &str) -> String {
    format!("User: {username} has left the chat room")
}

/// Broadcast notice when the administrator mutes a user
pub fn muted_notice(username: &str) -> String {
    format!("User: {username} has been muted by the administrator!")
}

/// Broadcast notice when the administrator kicks a user
pub fn kicked_notice(username: &str) -> String {
    format!("User: {username} has been kicked out by the administrator!")
}

/// Broadcast written on the admin console
pub fn manager_broadcast(body: &str) -> String {
    format!("{MANAGER_NAME} say : {body}")
}
