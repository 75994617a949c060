//! Transport pump
//!
//! Two tasks per connection: one turns socket reads into inbound frames, the
//! other writes outbound frames to the socket. A frame is whatever a single
//! read returns, so logical messages may arrive coalesced or split.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::types::{ConnectionClosed, SocketHandle};

/// One side of a pumped connection
#[derive(Debug)]
pub struct Transport {
    /// Peer address, the connection's identity
    pub addr: SocketAddr,
    /// Frames read from the socket
    pub inbound: mpsc::Receiver<String>,
    /// Frames to write to the socket
    pub outbound: mpsc::Sender<String>,
    /// Closes the socket and stops both pump tasks
    pub socket: SocketHandle,
}

/// Fires the connection-closed notification at most once
#[derive(Debug, Clone)]
struct CloseSignal {
    addr: SocketAddr,
    fired: Arc<AtomicBool>,
    closed_tx: mpsc::Sender<ConnectionClosed>,
    socket: SocketHandle,
}

impl CloseSignal {
    /// The socket is closed before the reaper hears about it, so a login
    /// racing the failure either sees the closed socket or leaves an entry
    /// the reaper will find.
    async fn fire(&self) {
        self.socket.close();
        if !self.fired.swap(true, Ordering::AcqRel) {
            debug!("Transport for {} failed, notifying reaper", self.addr);
            let _ = self.closed_tx.send(ConnectionClosed { addr: self.addr }).await;
        }
    }
}

/// Start the read and write tasks for `stream`
///
/// A read of zero bytes, a read error or a write error sends exactly one
/// `ConnectionClosed` for `addr` and stops both tasks. Closing the returned
/// socket handle stops them without a notification.
pub fn spawn<S>(
    stream: S,
    addr: SocketAddr,
    closed_tx: mpsc::Sender<ConnectionClosed>,
    read_buffer: usize,
    queue_size: usize,
) -> Transport
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(queue_size);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(queue_size);
    let socket = SocketHandle::new();
    let signal = CloseSignal {
        addr,
        fired: Arc::new(AtomicBool::new(false)),
        closed_tx,
        socket: socket.clone(),
    };

    // Read task (socket -> inbound queue)
    let read_signal = signal.clone();
    tokio::spawn(async move {
        let socket = read_signal.socket.clone();
        let mut buf = vec![0u8; read_buffer.max(1)];
        loop {
            let n = tokio::select! {
                _ = socket.closed() => break,
                res = reader.read(&mut buf) => match res {
                    Ok(0) => {
                        debug!("Peer {} closed the connection", addr);
                        read_signal.fire().await;
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        debug!("Read error for {}: {}", addr, e);
                        read_signal.fire().await;
                        break;
                    }
                },
            };

            let frame = String::from_utf8_lossy(&buf[..n]).into_owned();
            tokio::select! {
                _ = socket.closed() => break,
                res = inbound_tx.send(frame) => {
                    if res.is_err() {
                        debug!("Inbound queue for {} dropped, ending read task", addr);
                        break;
                    }
                }
            }
        }
        debug!("Read task ended for {}", addr);
    });

    // Write task (outbound queue -> socket)
    let write_signal = signal;
    tokio::spawn(async move {
        let socket = write_signal.socket.clone();
        loop {
            let frame = tokio::select! {
                _ = socket.closed() => break,
                frame = outbound_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let written = async {
                writer.write_all(frame.as_bytes()).await?;
                writer.flush().await
            };
            if let Err(e) = written.await {
                debug!("Write error for {}: {}", addr, e);
                write_signal.fire().await;
                break;
            }
        }
        debug!("Write task ended for {}", addr);

        let _ = writer.shutdown().await;
    });

    Transport {
        addr,
        inbound: inbound_rx,
        outbound: outbound_tx,
        socket,
    }
}
