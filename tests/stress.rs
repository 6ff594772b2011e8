//! Stress tests for call correlation under heavy fan-out
//!
//! Many calls are issued at once from several tasks and their responses are
//! delivered in a shuffled order; every caller must receive exactly its own
//! result.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use fast_rpc::core::packet::Packet;
use fast_rpc::core::serialization::{SerializationFormat, Serializer};
use fast_rpc::protocol::call::invoke_remote;
use fast_rpc::protocol::registry::PendingCallTable;
use fast_rpc::protocol::response::ResponseDispatcher;
use fast_rpc::transport::channel;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

const CALLS: u64 = 2_000;
const ISSUERS: u64 = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_shuffled_responses_reach_their_callers() {
    let format = SerializationFormat::Bincode;
    let registry = Arc::new(PendingCallTable::<SerializationFormat>::new());
    let dispatcher = ResponseDispatcher::new(Arc::clone(&registry), Arc::new(format));
    let (session, mut queue) = channel(1024);
    let next_id = Arc::new(AtomicU64::new(1));
    let start = Arc::new(Barrier::new(ISSUERS as usize));

    // Issuers register and send at the same time, sharing one id counter
    let mut issuers = Vec::new();
    for _ in 0..ISSUERS {
        let session = session.clone();
        let registry = Arc::clone(&registry);
        let next_id = Arc::clone(&next_id);
        let start = Arc::clone(&start);
        issuers.push(tokio::spawn(async move {
            start.wait().await;
            let mut waiters = Vec::new();
            for _ in 0..CALLS / ISSUERS {
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                let packet = Packet::call(id, "square", Vec::new());
                let pending = invoke_remote::<u64, _, _>(&session, &registry, &packet).unwrap();
                waiters.push(tokio::spawn(async move { (id, pending.await) }));
                tokio::task::yield_now().await;
            }
            waiters
        }));
    }
    let mut waiters = Vec::with_capacity(CALLS as usize);
    for issuer in issuers {
        waiters.extend(issuer.await.unwrap());
    }
    assert_eq!(registry.len(), CALLS as usize);

    let mut sent = Vec::with_capacity(CALLS as usize);
    while let Some(packet) = queue.try_recv() {
        sent.push(packet);
    }
    let ids: HashSet<u64> = sent.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), CALLS as usize, "every call needs a distinct id");

    sent.shuffle(&mut rand::rng());
    for request in &sent {
        let reply = request.reply(format.serialize(&(request.id * request.id)).unwrap());
        assert!(dispatcher.on_response(&reply));
    }

    for waiter in waiters {
        let (id, result) = waiter.await.unwrap();
        assert_eq!(result.unwrap(), id * id, "call {id} received another call's result");
    }
    assert!(registry.is_empty());

    let snapshot = registry.metrics().snapshot();
    assert_eq!(snapshot.calls_issued, CALLS);
    assert_eq!(snapshot.responses_matched, CALLS);
    assert_eq!(snapshot.responses_dropped, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_dispatch_from_many_tasks() {
    let format = SerializationFormat::MessagePack;
    let registry = Arc::new(PendingCallTable::<SerializationFormat>::new());
    let dispatcher = ResponseDispatcher::new(Arc::clone(&registry), Arc::new(format));
    let (session, mut queue) = channel(1024);

    let mut pending = Vec::new();
    for id in 1..=CALLS {
        let packet = Packet::call(id, "label", Vec::new());
        let response = invoke_remote::<String, _, _>(&session, &registry, &packet).unwrap();
        pending.push((id, response));
    }

    let mut requests = Vec::new();
    while let Some(packet) = queue.try_recv() {
        requests.push(packet);
    }
    requests.shuffle(&mut rand::rng());

    // Each response is delivered twice from different tasks; only one may land
    let mut tasks = Vec::new();
    for chunk in requests.chunks(100) {
        let chunk = chunk.to_vec();
        let first = dispatcher.clone();
        let second = dispatcher.clone();
        let copy = chunk.clone();
        tasks.push(tokio::spawn(async move {
            for request in chunk {
                let body = format.serialize(&format!("#{}", request.id)).unwrap();
                first.on_response(&request.reply(body));
            }
        }));
        tasks.push(tokio::spawn(async move {
            for request in copy {
                let body = format.serialize(&format!("#{}", request.id)).unwrap();
                second.on_response(&request.reply(body));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for (id, response) in pending {
        assert_eq!(response.await.unwrap(), format!("#{id}"));
    }

    let snapshot = registry.metrics().snapshot();
    assert_eq!(snapshot.responses_matched, CALLS);
    assert_eq!(snapshot.responses_dropped, CALLS);
}
