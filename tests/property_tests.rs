//! Property-based tests using proptest
//!
//! These tests validate framing and binding invariants across a wide range of
//! randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use fast_rpc::core::codec::PacketCodec;
use fast_rpc::core::packet::{split_segments, write_segment, Packet, PacketFlags};
use fast_rpc::core::serialization::SerializationFormat;
use fast_rpc::protocol::binder::{bind_parameters, CallArguments, ParameterType};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

fn packet_strategy() -> impl Strategy<Value = Packet> {
    (
        any::<u64>(),
        "[a-zA-Z0-9_.]{0,64}",
        0u8..4,
        prop::collection::vec(any::<u8>(), 0..4096),
    )
        .prop_map(|(id, api, flags, body)| Packet {
            id,
            api,
            flags: PacketFlags::from_bits(flags),
            body,
        })
}

// Property: Any packet survives framing unchanged
proptest! {
    #[test]
    fn prop_packet_roundtrip(packet in packet_strategy()) {
        let bytes = packet.to_bytes().expect("Serialization should not fail");
        let decoded = Packet::from_bytes(&bytes).expect("Deserialization should not fail");
        prop_assert_eq!(decoded, packet);
    }
}

// Property: A stream of frames split at arbitrary points decodes to the same packets
proptest! {
    #[test]
    fn prop_codec_stream_split_anywhere(
        packets in prop::collection::vec(packet_strategy(), 1..8),
        chunk in 1usize..64,
    ) {
        let mut codec = PacketCodec::default();
        let mut wire = BytesMut::new();
        for packet in &packets {
            codec.encode(packet, &mut wire).unwrap();
        }

        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(packet) = codec.decode(&mut buf).unwrap() {
                decoded.push(packet);
            }
        }

        prop_assert!(buf.is_empty());
        prop_assert_eq!(decoded, packets);
    }
}

// Property: Decoding arbitrary bytes never panics
proptest! {
    #[test]
    fn prop_arbitrary_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Packet::from_bytes(&data);
        let mut codec = PacketCodec::new(4096);
        let mut buf = BytesMut::from(&data[..]);
        let _ = codec.decode(&mut buf);
    }
}

// Property: Segments split back exactly as written, empty ones included
proptest! {
    #[test]
    fn prop_segments_preserved(
        segments in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16)
    ) {
        let mut body = Vec::new();
        for segment in &segments {
            write_segment(&mut body, segment);
        }

        let split = split_segments(&body).unwrap();
        prop_assert_eq!(split.len(), segments.len());
        for (got, expected) in split.iter().zip(&segments) {
            prop_assert_eq!(*got, expected.as_slice());
        }
    }
}

// Property: Bound integer arguments equal what was pushed; empty segments become zero
proptest! {
    #[test]
    fn prop_bind_integers(values in prop::collection::vec(prop::option::of(any::<i64>()), 0..12)) {
        let format = SerializationFormat::Bincode;
        let mut arguments = CallArguments::new();
        for value in &values {
            arguments = match value {
                Some(v) => arguments.push(&format, v).unwrap(),
                None => arguments.push_empty(),
            };
        }
        let packet = Packet::call(1, "ints", arguments.into_body());

        let types: Vec<ParameterType<SerializationFormat>> =
            values.iter().map(|_| ParameterType::of::<i64>()).collect();
        let mut args = bind_parameters(&format, &types, &packet).unwrap();

        for (index, value) in values.iter().enumerate() {
            prop_assert_eq!(args.take::<i64>(index).unwrap(), value.unwrap_or(0));
        }
    }
}
