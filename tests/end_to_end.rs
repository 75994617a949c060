//! End-to-end tests over loopback TCP
//!
//! Frames have no delimiter on the wire, so every read helper accumulates
//! bytes until the expected text shows up.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use chat_room::message::{joined_notice, kicked_notice, left_notice, SUCCESS};
use chat_room::{AdminConsole, ChatServer, ConnectionRegistry, CredentialStore, ServerConfig};

struct TestServer {
    addr: SocketAddr,
    admin: AdminConsole,
    registry: std::sync::Arc<ConnectionRegistry>,
    _dir: tempfile::TempDir,
}

async fn start_server(max_online: usize) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        port: 0,
        data_file: dir.path().join("database.txt"),
        max_online,
        ..ServerConfig::default()
    };
    let store = CredentialStore::load(&config.data_file, config.max_registered)
        .await
        .unwrap();
    let server = ChatServer::bind(config, store).await.unwrap();

    let port = server.local_addr().unwrap().port();
    let admin = server.admin_console();
    let registry = server.context().registry.clone();
    tokio::spawn(server.run());

    TestServer {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        admin,
        registry,
        _dir: dir,
    }
}

async fn send(stream: &mut TcpStream, frame: &str) {
    stream.write_all(frame.as_bytes()).await.unwrap();
}

async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut seen = String::new();
    let mut buf = [0u8; 1024];
    timeout(Duration::from_secs(5), async {
        while !seen.contains(needle) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed, received so far: {seen:?}");
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}, got {seen:?}"));
    seen
}

async fn read_reply(stream: &mut TcpStream) -> String {
    let mut buf = [0u8; 1024];
    let n = timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Register and log in, returning everything received up to the user list
async fn join(server: &TestServer, name: &str, pw: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    send(&mut stream, &format!("Reg-{name}-{pw}")).await;
    assert_eq!(read_reply(&mut stream).await, SUCCESS);

    // The list is the only frame with a line break before the name
    send(&mut stream, &format!("Log-{name}-{pw}")).await;
    let received = read_until(&mut stream, &format!("\r\n{name}")).await;
    (stream, received)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_chat_scenario() {
    let server = start_server(30).await;

    let (mut alice, received) = join(&server, "alice", "pw1").await;
    assert!(received.starts_with(SUCCESS));
    assert!(received.contains("Online users:\r\nalice"));
    assert!(!received.contains("bob"));

    let (mut bob, received) = join(&server, "bob", "pw2").await;
    assert!(received.contains("Online users:\r\nalice\r\nbob"));
    read_until(&mut alice, &joined_notice("bob")).await;

    send(&mut bob, "To-bob-alice-hi").await;
    read_until(&mut alice, "bob say to you : hi").await;

    send(&mut alice, "alice : hello everyone").await;
    read_until(&mut bob, "alice : hello everyone").await;

    drop(bob);
    read_until(&mut alice, &left_notice("bob")).await;
    wait_for(|| !server.registry.contains("bob")).await;
    assert_eq!(server.registry.snapshot_usernames(), vec!["alice"]);
}

#[tokio::test]
async fn test_rejections_are_plain_text() {
    let server = start_server(30).await;
    let (_alice, _) = join(&server, "alice", "pw1").await;

    let mut other = TcpStream::connect(server.addr).await.unwrap();

    send(&mut other, "Reg-alice-pw9").await;
    assert_eq!(
        read_reply(&mut other).await,
        "Username already exists, please choose another one!"
    );

    send(&mut other, "Log-alice-wrong").await;
    assert_eq!(read_reply(&mut other).await, "Wrong username or password!");

    send(&mut other, "Log-alice-pw1").await;
    assert_eq!(read_reply(&mut other).await, "User is already logged in!");

    // The rejected connection stays usable
    send(&mut other, "Reg-carol-pw3").await;
    assert_eq!(read_reply(&mut other).await, SUCCESS);
    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_room_full() {
    let server = start_server(1).await;
    let (_alice, _) = join(&server, "alice", "pw1").await;

    let mut bob = TcpStream::connect(server.addr).await.unwrap();
    send(&mut bob, "Reg-bob-pw2").await;
    assert_eq!(read_reply(&mut bob).await, SUCCESS);

    send(&mut bob, "Log-bob-pw2").await;
    assert_eq!(
        read_reply(&mut bob).await,
        "The chat room is full, please try again later"
    );
    assert_eq!(server.registry.len(), 1);
}

#[tokio::test]
async fn test_admin_mute_and_kick() {
    let server = start_server(30).await;
    let (mut alice, _) = join(&server, "alice", "pw1").await;
    let (mut bob, _) = join(&server, "bob", "pw2").await;
    read_until(&mut alice, &joined_notice("bob")).await;

    server.admin.send_to("bob", "behave").await.unwrap();
    read_until(&mut bob, "Manager say to you : behave").await;

    server.admin.mute("bob").await.unwrap();
    read_until(&mut bob, "/shield").await;

    server.admin.kick("bob").await.unwrap();
    read_until(&mut alice, &kicked_notice("bob")).await;
    assert!(!server.registry.contains("bob"));

    // Bob's socket is closed by the server
    let mut buf = [0u8; 1024];
    timeout(Duration::from_secs(5), async {
        loop {
            match bob.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    })
    .await
    .unwrap();

    // Kicks bypass the reaper, so no "left" notice follows
    send(&mut alice, "alice : anyone there?").await;
    let rest = read_until(&mut alice, "alice : anyone there?").await;
    assert!(!rest.contains(&left_notice("bob")));
}

#[tokio::test]
async fn test_hangup_right_after_login_frees_username() {
    let server = start_server(30).await;

    for round in 0..40 {
        let name = format!("user{round}");
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        send(&mut stream, &format!("Reg-{name}-pw")).await;
        assert_eq!(read_reply(&mut stream).await, SUCCESS);

        // Hang up without waiting for the login reply
        send(&mut stream, &format!("Log-{name}-pw")).await;
        drop(stream);
    }

    wait_for(|| server.registry.is_empty()).await;
    sleep(Duration::from_millis(200)).await;
    assert!(server.registry.is_empty(), "{:?}", server.registry.snapshot_usernames());

    // Every name can log in again
    for round in 0..40 {
        let name = format!("user{round}");
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        send(&mut stream, &format!("Log-{name}-pw")).await;
        read_until(&mut stream, &format!("\r\n{name}")).await;
        drop(stream);
        wait_for(|| !server.registry.contains(&name)).await;
    }
}
