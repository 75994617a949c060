//! Message router actor
//!
//! The single consumer of the global mailbox. Frames are dispatched one at a
//! time, in mailbox order, to the outbound queues found in the registry.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::RoutingRequest;
use crate::registry::ConnectionRegistry;

/// Sending side of the router mailbox
pub type Mailbox = mpsc::Sender<String>;

/// The message router actor
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    /// Mailbox receiver channel
    receiver: mpsc::Receiver<String>,
}

impl MessageRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, receiver: mpsc::Receiver<String>) -> Self {
        Self { registry, receiver }
    }

    /// Run the router event loop
    ///
    /// Continuously receives and dispatches frames until all senders are dropped.
    pub async fn run(mut self) {
        info!("Message router started");

        while let Some(frame) = self.receiver.recv().await {
            self.dispatch(&frame).await;
        }

        info!("Message router shutting down");
    }

    /// Dispatch one mailbox frame, returning how many queues accepted it
    ///
    /// A target that is not online is skipped silently. A broadcast goes to
    /// the users online when the registry is read; later joiners miss it.
    pub async fn dispatch(&self, frame: &str) -> usize {
        debug!("Routing {:?}", frame);

        let request = RoutingRequest::parse(frame);
        let text = request.delivered_text();

        match request.target() {
            Some(target) => {
                let Some(entry) = self.registry.get(target) else {
                    debug!("User {} is not online, dropping frame", target);
                    return 0;
                };
                usize::from(entry.send(text).await.is_ok())
            }
            None => {
                let mut delivered = 0;
                for entry in self.registry.entries() {
                    match entry.send(text.clone()).await {
                        Ok(()) => delivered += 1,
                        Err(e) => debug!("Skipping {}: {}", entry.username, e),
                    }
                }
                delivered
            }
        }
    }
}
