#![no_main]

use fast_rpc::core::serialization::SerializationFormat;
use fast_rpc::protocol::binder::{bind_parameters, ParameterType};
use fast_rpc::Packet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary call bodies must bind or fail cleanly in every format
    let packet = Packet::call(1, "fuzz", data.to_vec());
    for format in [
        SerializationFormat::Bincode,
        SerializationFormat::Json,
        SerializationFormat::MessagePack,
    ] {
        let types = [
            ParameterType::of::<u32>(),
            ParameterType::of::<String>(),
            ParameterType::of::<Vec<i64>>(),
        ];
        let _ = bind_parameters(&format, &types, &packet);
    }
});
