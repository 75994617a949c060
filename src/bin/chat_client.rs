//! Chat client - Entry Point
//!
//! Connects to the server, walks the user through registration and login,
//! then relays terminal input as chat frames. Any transport failure ends
//! the process with exit code 1.

use std::env;
use std::process;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use chat_room::client::{login_frame, register_frame, ChatSession, Outgoing, MUTED_NOTICE};
use chat_room::config::ClientConfig;
use chat_room::message::SUCCESS;
use chat_room::transport::{self, Transport};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they do not mix with the chat
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_room=warn,chat_client=warn")),
        )
        .init();

    let config = ClientConfig::from_args(env::args())?;

    let stream = TcpStream::connect(&config.server_addr).await?;
    let addr = stream.peer_addr()?;
    debug!("Connected to {}", addr);

    let (closed_tx, mut closed_rx) = mpsc::channel(1);
    let mut transport = transport::spawn(
        stream,
        addr,
        closed_tx,
        config.read_buffer,
        config.queue_size,
    );

    // The client does not survive a lost server
    tokio::spawn(async move {
        if closed_rx.recv().await.is_some() {
            eprintln!("Connection to the server was lost");
            process::exit(1);
        }
    });

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!("Connected to the server! Choose an action: 1) login 2) register");
    loop {
        let Some(choice) = read_line(&mut input).await? else {
            return Ok(());
        };
        match choice.as_str() {
            "1" => break,
            "2" => {
                if !register(&mut input, &mut transport).await? {
                    return Ok(());
                }
                break;
            }
            _ => println!("Invalid input, please try again!"),
        }
    }

    let Some(session) = login(&mut input, &mut transport).await? else {
        return Ok(());
    };

    let display = session.clone();
    let mut inbound = transport.inbound;
    tokio::spawn(async move {
        while let Some(frame) = inbound.recv().await {
            if let Some(text) = display.receive(frame) {
                println!("{}", text);
            }
        }
    });

    chat(&mut input, &transport.outbound, &session).await
}

async fn read_line(input: &mut Input) -> std::io::Result<Option<String>> {
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

async fn ask(input: &mut Input, question: &str) -> std::io::Result<Option<String>> {
    println!("{}", question);
    read_line(input).await
}

/// Send a frame and wait for the server's one-frame reply
async fn request(transport: &mut Transport, frame: String) -> String {
    if transport.outbound.send(frame).await.is_err() {
        eprintln!("Connection to the server was lost");
        process::exit(1);
    }
    match transport.inbound.recv().await {
        Some(reply) => reply,
        None => {
            eprintln!("Connection to the server was lost");
            process::exit(1);
        }
    }
}

/// Registration loop. `false` on end of input.
async fn register(input: &mut Input, transport: &mut Transport) -> std::io::Result<bool> {
    loop {
        let Some(username) = ask(input, "Enter username:").await? else {
            return Ok(false);
        };
        let Some(password) = ask(input, "Enter password:").await? else {
            return Ok(false);
        };
        let Some(confirm) = ask(input, "Confirm password:").await? else {
            return Ok(false);
        };

        if confirm != password {
            println!("The passwords do not match, please register again!");
            continue;
        }

        let reply = request(transport, register_frame(&username, &password)).await;
        if reply == SUCCESS {
            println!("Registration successful, please log in");
            return Ok(true);
        }
        println!("{}", reply);
    }
}

/// Login loop. `None` on end of input.
async fn login(input: &mut Input, transport: &mut Transport) -> std::io::Result<Option<ChatSession>> {
    loop {
        let Some(username) = ask(input, "Enter username:").await? else {
            return Ok(None);
        };
        if username.is_empty() {
            continue;
        }
        let Some(password) = ask(input, "Enter password:").await? else {
            return Ok(None);
        };

        let reply = request(transport, login_frame(&username, &password)).await;
        if reply == SUCCESS {
            println!("Login successful, you have entered the chat room!");
            return Ok(Some(ChatSession::new(username)));
        }
        println!("{}", reply);
    }
}

/// Chat input loop until `/quit` or end of input
async fn chat(
    input: &mut Input,
    outbound: &mpsc::Sender<String>,
    session: &ChatSession,
) -> Result<(), Box<dyn std::error::Error>> {
    while let Some(line) = read_line(input).await? {
        let outgoing = match line.as_str() {
            "/quit" => {
                println!("Leaving the chat room, see you next time!");
                return Ok(());
            }
            "/to" => {
                let Some(target) = ask(input, "Enter the user to talk to:").await? else {
                    break;
                };
                let Some(body) = ask(input, "Enter the message:").await? else {
                    break;
                };
                session.direct(&target, &body)
            }
            _ => session.chat(&line),
        };

        match outgoing {
            Outgoing::Send(frame) => {
                if outbound.send(frame).await.is_err() {
                    eprintln!("Connection to the server was lost");
                    process::exit(1);
                }
            }
            Outgoing::Muted => println!("{}", MUTED_NOTICE),
            Outgoing::Nothing => {}
        }
    }

    Ok(())
}
