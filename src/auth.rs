//! Authentication state machine
//!
//! Reads pre-auth frames from a fresh connection, answers registration and
//! login requests, and promotes the connection into the registry once a
//! login succeeds.
//!
//! | state           | event           | next            |
//! |-----------------|-----------------|-----------------|
//! | Unauthenticated | FrameReceived   | Authenticating  |
//! | Authenticating  | Answered        | Unauthenticated |
//! | Authenticating  | LoggedIn        | Authenticated   |
//! | any             | TransportClosed | Closed          |

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::error::AppError;
use crate::message::{joined_notice, user_list, AuthIntent, AuthRequest, RoutingRequest, SUCCESS};
use crate::registry::{ConnectionEntry, ConnectionRegistry};
use crate::router::Mailbox;
use crate::transport::Transport;
use crate::types::SocketHandle;

/// Where a connection stands in the login process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Closed,
}

/// Inputs that move a session between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A pre-auth frame arrived
    FrameReceived,
    /// The frame was answered without logging in (registration or rejection)
    Answered,
    /// Login succeeded and the registry entry exists
    LoggedIn,
    /// The transport failed or the socket was closed
    TransportClosed,
}

impl SessionState {
    /// Transition table; pairs not listed keep the current state
    pub fn next(self, event: SessionEvent) -> SessionState {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (_, TransportClosed) | (Closed, _) => Closed,
            (Unauthenticated, FrameReceived) => Authenticating,
            (Authenticating, Answered) => Unauthenticated,
            (Authenticating, LoggedIn) => Authenticated,
            (state, _) => state,
        }
    }
}

/// Outcome of driving one connection through authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub addr: SocketAddr,
    pub state: SessionState,
    /// Set once the session is `Authenticated`
    pub username: Option<String>,
}

impl Session {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            state: SessionState::Unauthenticated,
            username: None,
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        let next = self.state.next(event);
        if next != self.state {
            debug!("Session {}: {:?} -> {:?}", self.addr, self.state, next);
        }
        self.state = next;
    }
}

/// Registration and login against the credential store and registry
///
/// The store and the registry are never locked at the same time.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials: Arc<Mutex<CredentialStore>>,
    registry: Arc<ConnectionRegistry>,
    mailbox: Mailbox,
}

impl Authenticator {
    pub fn new(
        credentials: Arc<Mutex<CredentialStore>>,
        registry: Arc<ConnectionRegistry>,
        mailbox: Mailbox,
    ) -> Self {
        Self {
            credentials,
            registry,
            mailbox,
        }
    }

    /// Store a new user. Does not log in.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), AppError> {
        self.credentials.lock().await.insert(username, password).await?;
        info!("User {} registered", username);
        Ok(())
    }

    /// Check credentials and claim the username in the registry
    ///
    /// Checks run in order: room full, bad credentials, already online. The
    /// success token is queued on `outbound` as the entry is inserted, ahead
    /// of any frame routed to the new user. A socket that closed meanwhile
    /// gives the username back.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        addr: SocketAddr,
        outbound: &mpsc::Sender<String>,
        socket: &SocketHandle,
    ) -> Result<(), AppError> {
        if self.registry.is_full() {
            return Err(AppError::RoomFull);
        }

        let valid = {
            let store = self.credentials.lock().await;
            store
                .lookup(username)
                .is_some_and(|record| record.password == password)
        };
        if !valid {
            return Err(AppError::BadCredentials);
        }

        let permit = outbound
            .reserve()
            .await
            .map_err(|_| AppError::Disconnected)?;
        self.registry.put_with(
            ConnectionEntry::new(username, addr, outbound.clone(), socket.clone()),
            || permit.send(SUCCESS.to_string()),
        )?;

        if socket.is_closed() {
            debug!("Connection {} closed during login of {}", addr, username);
            self.registry.remove_by_addr(addr);
            return Err(AppError::Disconnected);
        }

        info!("User {} logged in from {}", username, addr);
        Ok(())
    }

    /// Drive a connection until it logs in or its transport closes
    ///
    /// On login the success token is queued to the client, then a joined
    /// broadcast and the user list addressed to the new user go to the router.
    pub async fn authenticate(&self, transport: &mut Transport) -> Session {
        let mut session = Session::new(transport.addr);

        loop {
            let frame = tokio::select! {
                _ = transport.socket.closed() => None,
                frame = transport.inbound.recv() => frame,
            };
            let Some(frame) = frame else {
                session.apply(SessionEvent::TransportClosed);
                return session;
            };
            session.apply(SessionEvent::FrameReceived);

            match self.answer(&frame, transport).await {
                Ok(request) if request.intent == AuthIntent::Login => {
                    session.apply(SessionEvent::LoggedIn);
                    self.announce(&request.username).await;
                    session.username = Some(request.username);
                    return session;
                }
                Ok(_) => {
                    let _ = transport.outbound.send(SUCCESS.to_string()).await;
                    session.apply(SessionEvent::Answered);
                }
                Err(AppError::Disconnected) => {
                    session.apply(SessionEvent::TransportClosed);
                    return session;
                }
                Err(e) => {
                    warn!("Rejected request from {}: {}", transport.addr, e);
                    let _ = transport.outbound.send(e.reply_text()).await;
                    session.apply(SessionEvent::Answered);
                }
            }
        }
    }

    async fn answer(&self, frame: &str, transport: &Transport) -> Result<AuthRequest, AppError> {
        let request = AuthRequest::parse(frame)?;
        match request.intent {
            AuthIntent::Register => self.register(&request.username, &request.password).await?,
            AuthIntent::Login => {
                self.login(
                    &request.username,
                    &request.password,
                    transport.addr,
                    &transport.outbound,
                    &transport.socket,
                )
                .await?
            }
        }
        Ok(request)
    }

    /// Tell everyone about the new user and send them the user list
    async fn announce(&self, username: &str) {
        let _ = self.mailbox.send(joined_notice(username)).await;

        let list = RoutingRequest::List {
            target: username.to_string(),
            body: user_list(self.registry.snapshot_usernames()),
        };
        let _ = self.mailbox.send(list.encode()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    struct Fixture {
        auth: Authenticator,
        registry: Arc<ConnectionRegistry>,
        mailbox_rx: mpsc::Receiver<String>,
        _dir: tempfile::TempDir,
    }

    fn fixture(max_online: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("database.txt"), 500);
        let registry = Arc::new(ConnectionRegistry::new(max_online));
        let (mailbox, mailbox_rx) = mpsc::channel(256);
        Fixture {
            auth: Authenticator::new(Arc::new(Mutex::new(store)), registry.clone(), mailbox),
            registry,
            mailbox_rx,
            _dir: dir,
        }
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    async fn login(f: &Fixture, name: &str, pw: &str, port: u16) -> Result<(), AppError> {
        let (tx, _rx) = mpsc::channel(8);
        f.auth
            .login(name, pw, addr(port), &tx, &SocketHandle::new())
            .await
    }

    #[test]
    fn test_transition_table() {
        use SessionEvent::*;
        use SessionState::*;

        assert_eq!(Unauthenticated.next(FrameReceived), Authenticating);
        assert_eq!(Authenticating.next(Answered), Unauthenticated);
        assert_eq!(Authenticating.next(LoggedIn), Authenticated);
        assert_eq!(Authenticated.next(TransportClosed), Closed);
        assert_eq!(Unauthenticated.next(TransportClosed), Closed);
        assert_eq!(Closed.next(FrameReceived), Closed);
        assert_eq!(Unauthenticated.next(LoggedIn), Unauthenticated);
    }

    #[tokio::test]
    async fn test_register_does_not_log_in() {
        let f = fixture(30);
        f.auth.register("alice", "pw1").await.unwrap();

        assert!(f.registry.is_empty());
        assert!(matches!(
            f.auth.register("alice", "other").await,
            Err(AppError::UsernameTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_login_rejections() {
        let f = fixture(30);
        f.auth.register("alice", "pw1").await.unwrap();

        assert!(matches!(
            login(&f, "alice", "wrong", 1).await,
            Err(AppError::BadCredentials)
        ));
        assert!(matches!(
            login(&f, "nobody", "pw1", 2).await,
            Err(AppError::BadCredentials)
        ));

        login(&f, "alice", "pw1", 3).await.unwrap();
        assert!(matches!(
            login(&f, "alice", "pw1", 4).await,
            Err(AppError::AlreadyOnline(_))
        ));
        assert_eq!(f.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_login_queues_success_token() {
        let f = fixture(30);
        f.auth.register("alice", "pw1").await.unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        f.auth
            .login("alice", "pw1", addr(5), &tx, &SocketHandle::new())
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), SUCCESS);

        // Rejections queue nothing
        f.auth
            .login("alice", "pw1", addr(6), &tx, &SocketHandle::new())
            .await
            .unwrap_err();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_login_on_closed_socket_releases_username() {
        let f = fixture(30);
        f.auth.register("alice", "pw1").await.unwrap();

        let (tx, _rx) = mpsc::channel(8);
        let socket = SocketHandle::new();
        socket.close();

        assert!(matches!(
            f.auth.login("alice", "pw1", addr(7), &tx, &socket).await,
            Err(AppError::Disconnected)
        ));
        assert!(f.registry.is_empty());
        assert!(f.registry.username_at(addr(7)).is_none());

        login(&f, "alice", "pw1", 8).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_logins_single_winner() {
        let f = fixture(30);
        f.auth.register("alice", "pw1").await.unwrap();

        let mut handles = Vec::new();
        for port in 0..8 {
            let auth = f.auth.clone();
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::channel(8);
                auth.login("alice", "pw1", addr(100 + port), &tx, &SocketHandle::new())
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => wins += 1,
                Err(e) => assert!(matches!(e, AppError::AlreadyOnline(_))),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(f.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_room_full_on_31st_login() {
        let f = fixture(30);
        for i in 0..31 {
            f.auth.register(&format!("user{i}"), "pw").await.unwrap();
        }
        for i in 0..30 {
            login(&f, &format!("user{i}"), "pw", 1000 + i).await.unwrap();
        }

        assert!(matches!(
            login(&f, "user30", "pw", 2000).await,
            Err(AppError::RoomFull)
        ));
        assert!(matches!(
            login(&f, "user30", "wrong", 2001).await,
            Err(AppError::RoomFull)
        ));
        assert_eq!(f.registry.len(), 30);
    }

    #[tokio::test]
    async fn test_authenticate_over_transport() {
        let mut f = fixture(30);
        let (server_side, mut peer) = tokio::io::duplex(1024);
        let (closed_tx, _closed_rx) = mpsc::channel(8);
        let mut transport = transport::spawn(server_side, addr(9000), closed_tx, 1024, 8);

        let auth = f.auth.clone();
        let task = tokio::spawn(async move {
            let session = auth.authenticate(&mut transport).await;
            (session, transport)
        });

        let mut buf = [0u8; 256];

        peer.write_all(b"Log-alice-pw1").await.unwrap();
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Wrong username or password!");

        peer.write_all(b"Reg-alice-pw1").await.unwrap();
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], SUCCESS.as_bytes());

        peer.write_all(b"Log-alice-pw1").await.unwrap();
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], SUCCESS.as_bytes());

        let (session, _transport) = timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.state, SessionState::Authenticated);
        assert_eq!(session.username.as_deref(), Some("alice"));
        assert_eq!(f.registry.username_at(addr(9000)).as_deref(), Some("alice"));

        assert_eq!(f.mailbox_rx.recv().await.unwrap(), joined_notice("alice"));
        assert_eq!(
            f.mailbox_rx.recv().await.unwrap(),
            "List-alice-Online users:\r\nalice"
        );
    }

    #[tokio::test]
    async fn test_authenticate_malformed_frame_then_close() {
        let f = fixture(30);
        let (server_side, mut peer) = tokio::io::duplex(1024);
        let (closed_tx, _closed_rx) = mpsc::channel(8);
        let mut transport = transport::spawn(server_side, addr(9001), closed_tx, 1024, 8);

        let auth = f.auth.clone();
        let task = tokio::spawn(async move { auth.authenticate(&mut transport).await });

        peer.write_all(b"garbage").await.unwrap();
        let mut buf = [0u8; 256];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Invalid request format!");

        drop(peer);
        let session = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(session.state, SessionState::Closed);
        assert!(session.username.is_none());
        assert!(f.registry.is_empty());
    }
}
