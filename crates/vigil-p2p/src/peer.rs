use crate::NetMessage;
use log::debug;
use std::collections::HashSet;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer={}", self.0)
    }
}

/// A connected peer as seen by the sync and locking core.
///
/// Outbound messages are pushed onto the peer's queue and never block; the
/// connection task owning the receiving end writes them to the socket.
#[derive(Debug)]
pub struct Peer {
    pub id: PeerId,
    pub address: String,
    pub protocol_version: u32,
    fulfilled_requests: HashSet<String>,
    outbound: mpsc::UnboundedSender<NetMessage>,
}

impl Peer {
    pub fn new(
        id: PeerId,
        address: String,
        protocol_version: u32,
    ) -> (Self, mpsc::UnboundedReceiver<NetMessage>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let peer = Peer {
            id,
            address,
            protocol_version,
            fulfilled_requests: HashSet::new(),
            outbound,
        };
        (peer, rx)
    }

    /// Enqueue a message for this peer. Fire-and-forget.
    pub fn push_message(&self, message: NetMessage) {
        let command = message.command();
        if self.outbound.send(message).is_err() {
            debug!("[{}] outbound queue closed, dropping {}", self.id, command);
        }
    }

    pub fn has_fulfilled_request(&self, name: &str) -> bool {
        self.fulfilled_requests.contains(name)
    }

    pub fn fulfilled_request(&mut self, name: &str) {
        self.fulfilled_requests.insert(name.to_string());
    }

    pub fn clear_fulfilled_request(&mut self, name: &str) {
        self.fulfilled_requests.remove(name);
    }

    pub fn is_connected(&self) -> bool {
        !self.outbound.is_closed()
    }
}
