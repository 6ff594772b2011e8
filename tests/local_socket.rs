#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use fast_rpc::config::SessionConfig;
use fast_rpc::core::serialization::SerializationFormat;
use fast_rpc::error::RpcError;
use fast_rpc::protocol::binder::{CallArguments, ParameterType};
use fast_rpc::protocol::dispatcher::ActionTable;
use fast_rpc::transport::local;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn actions() -> Arc<ActionTable<SerializationFormat>> {
    let actions = Arc::new(ActionTable::new(Arc::new(SerializationFormat::Bincode)));
    actions
        .register_fn("upper", vec![ParameterType::of::<String>()], |mut args| {
            Ok(args.take::<String>(0)?.to_uppercase())
        })
        .unwrap();
    actions
}

async fn wait_for_socket(path: &Path) {
    for _ in 0..100 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never bound {}", path.display());
}

#[tokio::test]
async fn test_call_over_unix_socket_and_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rpc.sock");
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let server = tokio::spawn(local::start_server_with_shutdown(
        path.clone(),
        SessionConfig::default(),
        actions(),
        shutdown_rx,
    ));
    wait_for_socket(&path).await;

    let client_actions = Arc::new(ActionTable::new(Arc::new(SerializationFormat::Bincode)));
    let (client, driver) = local::connect(&path, SessionConfig::default(), client_actions)
        .await
        .unwrap();

    let args = CallArguments::new()
        .push(&SerializationFormat::Bincode, "quiet")
        .unwrap();
    let loud: String = client.invoke("upper", args).await.unwrap();
    assert_eq!(loud, "QUIET");

    shutdown_tx.send(()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
    assert!(!path.exists(), "socket file should be removed");

    // The server closed our connection, so the client session has ended
    tokio::time::timeout(Duration::from_secs(5), driver)
        .await
        .expect("client driver should stop")
        .unwrap()
        .unwrap();
    assert!(matches!(
        client.call::<String>("upper", CallArguments::new()),
        Err(RpcError::ConnectionClosed)
    ));
}
