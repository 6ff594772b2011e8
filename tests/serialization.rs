//! Integration tests for argument and result encoding across formats
//!
//! Arguments built with [`CallArguments`] must bind on the callee with the same
//! format, and results decoded by the response path must match what the
//! handler returned.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::uninlined_format_args
)]

use fast_rpc::core::packet::Packet;
use fast_rpc::core::serialization::{SerializationFormat, Serializer};
use fast_rpc::error::RpcError;
use fast_rpc::protocol::binder::{bind_parameters, CallArguments, ParameterType};
use fast_rpc::protocol::registry::{PendingCall, PendingCallTable};
use fast_rpc::protocol::response::ResponseDispatcher;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const FORMATS: [SerializationFormat; 3] = [
    SerializationFormat::Bincode,
    SerializationFormat::Json,
    SerializationFormat::MessagePack,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u64,
    items: Vec<String>,
    total: f64,
}

#[test]
fn test_arguments_bind_in_every_format() {
    for format in FORMATS {
        let order = Order {
            id: 9,
            items: vec!["tea".to_string(), "scone".to_string()],
            total: 7.5,
        };
        let body = CallArguments::new()
            .push(&format, &order)
            .unwrap()
            .push(&format, "express")
            .unwrap()
            .into_body();
        let packet = Packet::call(1, "place", body);

        let types = [ParameterType::of::<Order>(), ParameterType::of::<String>()];
        let mut args = bind_parameters(&format, &types, &packet)
            .unwrap_or_else(|e| panic!("{} failed to bind: {}", format.name(), e));

        assert_eq!(args.take::<Order>(0).unwrap(), order);
        assert_eq!(args.take::<String>(1).unwrap(), "express");
    }
}

#[test]
fn test_empty_segment_binds_zero_value_in_every_format() {
    for format in FORMATS {
        let body = CallArguments::new().push_empty().into_body();
        let packet = Packet::call(1, "place", body);

        let mut args = bind_parameters(&format, &[ParameterType::of::<Order>()], &packet).unwrap();
        assert_eq!(args.take::<Order>(0).unwrap(), Order::default());
    }
}

#[test]
fn test_cross_format_arguments_fail_to_bind() {
    let body = CallArguments::new()
        .push(&SerializationFormat::Json, "not a number")
        .unwrap()
        .into_body();
    let packet = Packet::call(1, "count", body);

    let result = bind_parameters(
        &SerializationFormat::Bincode,
        &[ParameterType::of::<u64>()],
        &packet,
    );
    assert!(matches!(result, Err(RpcError::Deserialize(_))));
}

#[tokio::test]
async fn test_response_decoded_with_registered_type() {
    for format in FORMATS {
        let registry = Arc::new(PendingCallTable::<SerializationFormat>::new());
        let dispatcher = ResponseDispatcher::new(Arc::clone(&registry), Arc::new(format));

        let (call, rx) = PendingCall::new::<Order>(11);
        registry.add(call).unwrap();

        let order = Order {
            id: 11,
            items: vec![],
            total: 0.25,
        };
        let reply = Packet::call(11, "lookup", vec![]).reply(Serializer::serialize(&format, &order).unwrap());
        assert!(dispatcher.on_response(&reply));

        assert_eq!(rx.await.unwrap().unwrap(), order);
    }
}

#[tokio::test]
async fn test_undecodable_response_fails_the_call() {
    let registry = Arc::new(PendingCallTable::<SerializationFormat>::new());
    let dispatcher = ResponseDispatcher::new(
        Arc::clone(&registry),
        Arc::new(SerializationFormat::Json),
    );

    let (call, rx) = PendingCall::new::<Order>(12);
    registry.add(call).unwrap();

    let reply = Packet::call(12, "lookup", vec![]).reply(b"{ not json".to_vec());
    assert!(dispatcher.on_response(&reply));
    assert!(matches!(rx.await.unwrap(), Err(RpcError::Deserialize(_))));
    assert!(registry.is_empty());
    assert_eq!(registry.metrics().snapshot().decode_failures, 1);
}
