use crate::config::MAX_PACKET_SIZE;
use crate::core::packet::{read_header, Packet, HEADER_SIZE};
use crate::error::RpcError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Tokio codec framing [`Packet`]s over a byte stream.
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_packet_size: usize,
}

impl PacketCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_PACKET_SIZE)
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = RpcError;

    /// Header faults end the stream. A complete frame whose fields do not
    /// decode is logged and skipped, since its boundary is still known.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < HEADER_SIZE {
                return Ok(None);
            }

            // Validate before waiting for the body so an oversized claim never buffers
            let counted = read_header(&src[..HEADER_SIZE], self.max_packet_size)?;
            let total = HEADER_SIZE + counted;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }

            let frame = src.split_to(total);
            let mut fields = frame.freeze();
            fields.advance(HEADER_SIZE);
            match Packet::decode_fields(&fields) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => warn!(error = %e, frame_len = total, "Skipping malformed frame"),
            }
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = RpcError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst, self.max_packet_size)
    }
}

impl Encoder<&Packet> for PacketCodec {
    type Error = RpcError;

    fn encode(&mut self, item: &Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst, self.max_packet_size)
    }
}
