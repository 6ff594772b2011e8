//! # Packet
//!
//! A single request or response exchanged over a session.
//!
//! ```text
//! [Magic(4)] [Version(1)] [Length(4)] [Id(8)] [Flags(1)] [ApiLen(1)] [Api(N)] [Body(M)]
//! ```
//!
//! `Length` counts every byte after the length field. All integers are
//! big-endian. Call bodies carry one length-prefixed segment per declared
//! parameter; see [`split_segments`] and [`write_segment`].

use crate::config::{MAGIC_BYTES, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use crate::error::{constants, Result, RpcError};
use bytes::{Buf, BufMut, BytesMut};

/// Bytes before the length-counted section: magic, version and length.
pub const HEADER_SIZE: usize = 9;

/// Fixed bytes inside the length-counted section: id, flags and api length.
pub const FIXED_FIELDS_SIZE: usize = 10;

/// Longest api name that fits the one-byte length prefix.
pub const MAX_API_NAME_LEN: usize = u8::MAX as usize;

/// Packet flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(u8);

impl PacketFlags {
    pub const NONE: PacketFlags = PacketFlags(0);
    /// Sent by the callee back to the caller.
    pub const RESPONSE: PacketFlags = PacketFlags(0x01);
    /// Body carries a UTF-8 failure message instead of a value.
    pub const EXCEPTION: PacketFlags = PacketFlags(0x02);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        PacketFlags(bits & (Self::RESPONSE.0 | Self::EXCEPTION.0))
    }

    pub fn contains(self, other: PacketFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PacketFlags) {
        self.0 |= other.0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Correlation id chosen by the caller and echoed by the callee
    pub id: u64,
    /// Name of the remote action
    pub api: String,
    pub flags: PacketFlags,
    pub body: Vec<u8>,
}

impl Packet {
    /// Build a call packet. `body` is usually produced by
    /// [`CallArguments`](crate::protocol::binder::CallArguments).
    pub fn call(id: u64, api: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            id,
            api: api.into(),
            flags: PacketFlags::NONE,
            body,
        }
    }

    /// Build the success response to this packet.
    pub fn reply(&self, body: Vec<u8>) -> Self {
        Self {
            id: self.id,
            api: self.api.clone(),
            flags: PacketFlags::RESPONSE,
            body,
        }
    }

    /// Build the exception response to this packet.
    pub fn reply_exception(&self, message: &str) -> Self {
        let mut flags = PacketFlags::RESPONSE;
        flags.insert(PacketFlags::EXCEPTION);
        Self {
            id: self.id,
            api: self.api.clone(),
            flags,
            body: message.as_bytes().to_vec(),
        }
    }

    pub fn is_response(&self) -> bool {
        self.flags.contains(PacketFlags::RESPONSE)
    }

    pub fn is_exception(&self) -> bool {
        self.flags.contains(PacketFlags::EXCEPTION)
    }

    /// Number of bytes after the length field; the size checked against limits.
    pub fn encoded_len(&self) -> usize {
        FIXED_FIELDS_SIZE + self.api.len() + self.body.len()
    }

    /// Append the framed packet to `dst`, rejecting packets that exceed `max_size`.
    pub fn encode_into(&self, dst: &mut BytesMut, max_size: usize) -> Result<()> {
        if self.api.len() > MAX_API_NAME_LEN {
            return Err(RpcError::Custom(
                constants::ERR_API_NAME_TOO_LONG.to_string(),
            ));
        }

        let counted = self.encoded_len();
        if counted > max_size {
            return Err(RpcError::OversizedPacket(counted));
        }

        dst.reserve(HEADER_SIZE + counted);
        dst.put_slice(&MAGIC_BYTES);
        dst.put_u8(PROTOCOL_VERSION);
        dst.put_u32(counted as u32);
        dst.put_u64(self.id);
        dst.put_u8(self.flags.bits());
        dst.put_u8(self.api.len() as u8);
        dst.put_slice(self.api.as_bytes());
        dst.put_slice(&self.body);
        Ok(())
    }

    /// Serialize to a standalone frame using the default size limit.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.encoded_len());
        self.encode_into(&mut buf, MAX_PACKET_SIZE)?;
        Ok(buf.to_vec())
    }

    /// Parse one complete frame.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(RpcError::InvalidHeader);
        }

        let counted = read_header(buf, MAX_PACKET_SIZE)?;
        if buf.len() < HEADER_SIZE + counted {
            return Err(RpcError::InvalidHeader);
        }

        Self::decode_fields(&buf[HEADER_SIZE..HEADER_SIZE + counted])
    }

    /// Parse the length-counted section of a frame.
    pub(crate) fn decode_fields(mut fields: &[u8]) -> Result<Self> {
        if fields.len() < FIXED_FIELDS_SIZE {
            return Err(RpcError::InvalidHeader);
        }

        let id = fields.get_u64();
        let flags = PacketFlags::from_bits(fields.get_u8());
        let api_len = fields.get_u8() as usize;
        if fields.len() < api_len {
            return Err(RpcError::InvalidHeader);
        }

        let api = std::str::from_utf8(&fields[..api_len])
            .map_err(|_| RpcError::InvalidHeader)?
            .to_string();
        let body = fields[api_len..].to_vec();

        Ok(Self {
            id,
            api,
            flags,
            body,
        })
    }
}

/// Validate magic and version and return the counted length.
pub(crate) fn read_header(buf: &[u8], max_size: usize) -> Result<usize> {
    if buf[0..4] != MAGIC_BYTES {
        return Err(RpcError::InvalidHeader);
    }

    let version = buf[4];
    if version != PROTOCOL_VERSION {
        return Err(RpcError::UnsupportedVersion(version));
    }

    let counted = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) as usize;
    if counted > max_size {
        return Err(RpcError::OversizedPacket(counted));
    }
    if counted < FIXED_FIELDS_SIZE {
        return Err(RpcError::InvalidHeader);
    }

    Ok(counted)
}

/// Append one length-prefixed parameter segment to a call body.
pub fn write_segment(body: &mut Vec<u8>, segment: &[u8]) {
    body.extend_from_slice(&(segment.len() as u32).to_be_bytes());
    body.extend_from_slice(segment);
}

/// Split a call body into its parameter segments, in declaration order.
pub fn split_segments(mut body: &[u8]) -> Result<Vec<&[u8]>> {
    let mut segments = Vec::new();
    while !body.is_empty() {
        if body.len() < 4 {
            return Err(RpcError::Deserialize(
                constants::ERR_TRUNCATED_SEGMENT.to_string(),
            ));
        }
        let len = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
        body = &body[4..];
        if body.len() < len {
            return Err(RpcError::Deserialize(
                constants::ERR_TRUNCATED_SEGMENT.to_string(),
            ));
        }
        segments.push(&body[..len]);
        body = &body[len..];
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_bits_ignores_unknown() {
        let flags = PacketFlags::from_bits(0xF3);
        assert!(flags.contains(PacketFlags::RESPONSE));
        assert!(flags.contains(PacketFlags::EXCEPTION));
        assert_eq!(flags.bits(), 0x03);
    }

    #[test]
    fn test_reply_echoes_id_and_api() {
        let call = Packet::call(42, "sum", vec![1, 2, 3]);
        let reply = call.reply(vec![9]);
        assert_eq!(reply.id, 42);
        assert_eq!(reply.api, "sum");
        assert!(reply.is_response());
        assert!(!reply.is_exception());
    }

    #[test]
    fn test_reply_exception_sets_both_flags() {
        let call = Packet::call(7, "div", vec![]);
        let reply = call.reply_exception("divide by zero");
        assert!(reply.is_response());
        assert!(reply.is_exception());
        assert_eq!(reply.body, b"divide by zero");
    }

    #[test]
    fn test_header_layout() {
        let packet = Packet::call(0x0102_0304_0506_0708, "ab", vec![0xEE]);
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &MAGIC_BYTES);
        assert_eq!(bytes[4], PROTOCOL_VERSION);
        assert_eq!(&bytes[5..9], &13u32.to_be_bytes());
        assert_eq!(&bytes[9..17], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(bytes[17], 0);
        assert_eq!(bytes[18], 2);
        assert_eq!(&bytes[19..21], b"ab");
        assert_eq!(bytes[21], 0xEE);
    }

    #[test]
    fn test_api_name_too_long_rejected() {
        let packet = Packet::call(1, "x".repeat(256), vec![]);
        assert!(packet.to_bytes().is_err());
    }

    #[test]
    fn test_segments_keep_empty_entries() {
        let mut body = Vec::new();
        write_segment(&mut body, &[]);
        write_segment(&mut body, b"hi");
        let segments = split_segments(&body).unwrap();
        assert_eq!(segments, vec![&b""[..], &b"hi"[..]]);
    }

    #[test]
    fn test_truncated_segment_rejected() {
        let mut body = Vec::new();
        write_segment(&mut body, b"hello");
        body.truncate(6);
        assert!(matches!(
            split_segments(&body),
            Err(RpcError::Deserialize(_))
        ));
    }
}
