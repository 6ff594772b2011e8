#![no_main]

use bytes::BytesMut;
use fast_rpc::core::codec::PacketCodec;
use fast_rpc::Packet;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Standalone frame parsing must never panic
    let _ = Packet::from_bytes(data);

    // Neither may the streaming decoder, however the input is framed
    let mut codec = PacketCodec::new(64 * 1024);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
