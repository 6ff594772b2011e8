//! # Transport
//!
//! The session boundary the dispatch core sends through, and the pieces that
//! drive a session over a byte stream.
//!
//! ## Components
//! - [`Session`]: fire-and-forget send of one packet
//! - [`ChannelSession`]: a [`Session`] that queues packets for a writer task
//! - [`session::RpcSession`]: full duplex driver over any `AsyncRead + AsyncWrite`
//! - [`local`]: Unix domain socket server and client

use crate::core::packet::{Packet, MAX_API_NAME_LEN};
use crate::error::{constants, Result, RpcError};
use tokio::sync::mpsc;

pub mod local;
pub mod session;

/// Write side of a connection.
pub trait Session: Send + Sync {
    /// Send one packet. Returns once the packet is handed to the transport;
    /// fails if the connection is gone.
    fn send(&self, packet: &Packet) -> Result<()>;
}

/// [`Session`] backed by a queue drained by the connection's writer.
///
/// Packets are validated against the frame limits before they are queued, so
/// a bad packet fails its sender instead of the writer. The queue is
/// unbounded: once a packet is valid, only a closed connection fails a send.
#[derive(Debug, Clone)]
pub struct ChannelSession {
    tx: mpsc::UnboundedSender<Packet>,
    max_packet_size: usize,
}

/// Receiving half of a [`ChannelSession`].
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::UnboundedReceiver<Packet>,
}

impl OutboundQueue {
    /// Next queued packet, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.rx.recv().await
    }

    /// Next queued packet without waiting.
    pub fn try_recv(&mut self) -> Option<Packet> {
        self.rx.try_recv().ok()
    }
}

/// Create a session queue that accepts packets up to `max_packet_size` bytes.
pub fn channel(max_packet_size: usize) -> (ChannelSession, OutboundQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChannelSession {
            tx,
            max_packet_size,
        },
        OutboundQueue { rx },
    )
}

impl ChannelSession {
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Session for ChannelSession {
    fn send(&self, packet: &Packet) -> Result<()> {
        if packet.api.len() > MAX_API_NAME_LEN {
            return Err(RpcError::Custom(
                constants::ERR_API_NAME_TOO_LONG.to_string(),
            ));
        }
        let len = packet.encoded_len();
        if len > self.max_packet_size {
            return Err(RpcError::OversizedPacket(len));
        }

        self.tx
            .send(packet.clone())
            .map_err(|_| RpcError::ConnectionClosed)
    }
}
