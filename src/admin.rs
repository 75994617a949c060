//! Administrator console
//!
//! Local, out-of-band producer of routing requests. Admin accounts only live
//! for the lifetime of the process and never touch the credential store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::info;

use crate::error::AppError;
use crate::message::{
    kicked_notice, manager_broadcast, muted_notice, user_list, RoutingRequest, MANAGER_NAME,
    SHIELD_COMMAND,
};
use crate::registry::ConnectionRegistry;
use crate::router::Mailbox;

/// Admin commands and the in-memory admin accounts
pub struct AdminConsole {
    admins: HashMap<String, String>,
    registry: Arc<ConnectionRegistry>,
    mailbox: Mailbox,
}

impl AdminConsole {
    pub fn new(registry: Arc<ConnectionRegistry>, mailbox: Mailbox) -> Self {
        Self {
            admins: HashMap::new(),
            registry,
            mailbox,
        }
    }

    /// Add or overwrite an admin account
    pub fn register_admin(&mut self, name: &str, password: &str) {
        self.admins.insert(name.to_string(), password.to_string());
        info!("Admin {} registered", name);
    }

    pub fn login(&self, name: &str, password: &str) -> Result<(), AppError> {
        match self.admins.get(name) {
            Some(stored) if stored == password => {
                info!("Admin {} logged in", name);
                Ok(())
            }
            _ => Err(AppError::AdminBadCredentials),
        }
    }

    /// Current online user list
    pub fn user_list(&self) -> String {
        user_list(self.registry.snapshot_usernames())
    }

    /// Direct message from the manager to an online user
    pub async fn send_to(&self, username: &str, body: &str) -> Result<(), AppError> {
        if !self.registry.contains(username) {
            return Err(AppError::UnknownUser(username.to_string()));
        }
        let request = RoutingRequest::Direct {
            from: MANAGER_NAME.to_string(),
            to: username.to_string(),
            body: body.to_string(),
        };
        self.push(request.encode()).await
    }

    /// Broadcast from the manager to everyone online
    pub async fn broadcast(&self, body: &str) -> Result<(), AppError> {
        self.push(manager_broadcast(body)).await
    }

    /// Tell a user's client to stop sending chat, and announce it
    pub async fn mute(&self, username: &str) -> Result<(), AppError> {
        let command = RoutingRequest::Command {
            target: username.to_string(),
            command: SHIELD_COMMAND.to_string(),
        };
        self.push(command.encode()).await?;
        self.push(muted_notice(username)).await
    }

    /// Announce the kick, then drop the user's entry and close its socket
    ///
    /// Bypasses the disconnect reaper, so no "left" notice follows.
    pub async fn kick(&self, username: &str) -> Result<(), AppError> {
        self.push(kicked_notice(username)).await?;

        let entry = self
            .registry
            .remove(username)
            .ok_or_else(|| AppError::UnknownUser(username.to_string()))?;
        entry.socket.close();

        info!("Admin kicked {} ({})", username, entry.addr);
        Ok(())
    }

    async fn push(&self, frame: String) -> Result<(), AppError> {
        self.mailbox
            .send(frame)
            .await
            .map_err(|_| AppError::ChannelSend)
    }

    /// Interactive console loop
    ///
    /// Authenticates the operator, then reads `/to`, `/all`, `/shield` and
    /// `/remove` commands until `input` reaches end of file.
    pub async fn run<R, W>(mut self, input: R, output: W) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut term = Terminal {
            lines: input.lines(),
            output,
        };

        if !self.sign_in(&mut term).await? {
            return Ok(());
        }

        while let Some(command) = term.read().await? {
            match command.as_str() {
                "/to" => {
                    term.say(&self.user_list()).await?;
                    let Some(target) = term.ask("Enter the user to talk to:").await? else {
                        break;
                    };
                    if !self.registry.contains(&target) {
                        term.say(&AppError::UnknownUser(target).reply_text()).await?;
                        continue;
                    }
                    let Some(body) = term.ask("Enter the message:").await? else {
                        break;
                    };
                    if let Err(e) = self.send_to(&target, &body).await {
                        term.say(&e.reply_text()).await?;
                    }
                }
                "/all" => {
                    let Some(body) = term.ask("Enter the message:").await? else {
                        break;
                    };
                    self.broadcast(&body).await?;
                }
                "/shield" => {
                    term.say(&self.user_list()).await?;
                    let Some(target) = term.ask("Enter the user to mute:").await? else {
                        break;
                    };
                    self.mute(&target).await?;
                }
                "/remove" => {
                    term.say(&self.user_list()).await?;
                    let Some(target) = term.ask("Enter the user to kick:").await? else {
                        break;
                    };
                    match self.kick(&target).await {
                        Ok(()) => {}
                        Err(e) if e.is_rejection() => term.say(&e.reply_text()).await?,
                        Err(e) => return Err(e),
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Register and/or log in the operator. `false` on end of input.
    async fn sign_in<R, W>(&mut self, term: &mut Terminal<R, W>) -> Result<bool, AppError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        term.say("Choose an action: 1) register admin 2) admin login")
            .await?;

        loop {
            let Some(choice) = term.read().await? else {
                return Ok(false);
            };
            match choice.as_str() {
                "1" => {
                    let Some(name) = term.ask("Enter admin name:").await? else {
                        return Ok(false);
                    };
                    let Some(password) = term.ask("Enter admin password:").await? else {
                        return Ok(false);
                    };
                    self.register_admin(&name, &password);
                    term.say("Registered! Please log in").await?;
                    break;
                }
                "2" => break,
                _ => {}
            }
        }

        loop {
            let Some(name) = term.ask("Enter admin name:").await? else {
                return Ok(false);
            };
            let Some(password) = term.ask("Enter admin password:").await? else {
                return Ok(false);
            };
            match self.login(&name, &password) {
                Ok(()) => {
                    term.say("Login successful!").await?;
                    return Ok(true);
                }
                Err(e) => term.say(&e.reply_text()).await?,
            }
        }
    }
}

/// Line-oriented prompt over an async reader and writer
struct Terminal<R, W> {
    lines: Lines<R>,
    output: W,
}

impl<R, W> Terminal<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn say(&mut self, text: &str) -> Result<(), AppError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<String>, AppError> {
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    async fn ask(&mut self, question: &str) -> Result<Option<String>, AppError> {
        self.say(question).await?;
        self.read().await
    }
}
