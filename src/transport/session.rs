//! # Rpc Session
//!
//! Drives one persistent connection: issues calls, classifies every inbound
//! packet as a response or a call, runs handlers, and returns their results
//! or failures to the peer.
//!
//! ## Lifecycle
//! ```text
//! new/spawn ──▶ run (read + write loop) ──▶ EOF / error / close()
//!                                              │
//!                        every pending call ◀──┘ fails with ConnectionClosed
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use fast_rpc::config::SessionConfig;
//! use fast_rpc::core::serialization::SerializationFormat;
//! use fast_rpc::protocol::binder::{CallArguments, ParameterType};
//! use fast_rpc::protocol::dispatcher::ActionTable;
//! use fast_rpc::transport::session::RpcSession;
//! use std::sync::Arc;
//!
//! # async fn demo(stream: tokio::net::TcpStream) -> fast_rpc::error::Result<()> {
//! let format = SerializationFormat::Bincode;
//! let actions = Arc::new(ActionTable::new(Arc::new(format)));
//! actions.register_fn("echo", vec![ParameterType::of::<String>()], |mut args| {
//!     args.take::<String>(0)
//! })?;
//!
//! let (session, _driver) = RpcSession::spawn(stream, SessionConfig::default(), actions)?;
//! let args = CallArguments::new().push(&format, "hi")?;
//! let reply: String = session.invoke("echo", args).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::SessionConfig;
use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::core::serialization::{SerializationFormat, Serializer};
use crate::error::{constants, Result, RpcError};
use crate::protocol::binder::CallArguments;
use crate::protocol::call::{invoke_remote, PendingResponse};
use crate::protocol::dispatcher::ActionTable;
use crate::protocol::exception::send_remote_failure;
use crate::protocol::registry::PendingCallTable;
use crate::protocol::response::ResponseDispatcher;
use crate::transport::{channel, ChannelSession, OutboundQueue, Session};
use crate::utils::metrics::{RpcMetrics, Timer};
use futures::{FutureExt, SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

/// Handle to one rpc session. Cheap to clone; clones share all state.
pub struct RpcSession<S = SerializationFormat> {
    inner: Arc<SessionInner<S>>,
}

impl<S> Clone for RpcSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner<S> {
    config: SessionConfig,
    registry: Arc<PendingCallTable<S>>,
    responses: ResponseDispatcher<S>,
    actions: Arc<ActionTable<S>>,
    outbound: ChannelSession,
    next_id: AtomicU64,
    closed: AtomicBool,
    shutdown: Notify,
    metrics: Arc<RpcMetrics>,
}

impl<S: Serializer> RpcSession<S> {
    /// Create a session and the outbound queue [`run`](Self::run) drains.
    ///
    /// Arguments and results are encoded with the action table's serializer.
    /// Fails with [`RpcError::ConfigError`] when that serializer is a stock
    /// format other than `config.serialization`.
    pub fn new(
        config: SessionConfig,
        actions: Arc<ActionTable<S>>,
    ) -> Result<(Self, OutboundQueue)> {
        check_serializer(&config, actions.serializer().as_ref())?;

        let metrics = Arc::new(RpcMetrics::new());
        let registry = Arc::new(PendingCallTable::with_metrics(Arc::clone(&metrics)));
        let responses =
            ResponseDispatcher::new(Arc::clone(&registry), Arc::clone(actions.serializer()));
        let (outbound, queue) = channel(config.max_packet_size);

        let inner = SessionInner {
            config,
            registry,
            responses,
            actions,
            outbound,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
            metrics,
        };
        Ok((
            Self {
                inner: Arc::new(inner),
            },
            queue,
        ))
    }

    /// Create a session over `io` and drive it on a spawned task.
    pub fn spawn<IO>(
        io: IO,
        config: SessionConfig,
        actions: Arc<ActionTable<S>>,
    ) -> Result<(Self, JoinHandle<Result<()>>)>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (session, queue) = Self::new(config, actions)?;
        let driver = session.clone();
        let handle = tokio::spawn(async move { driver.run(io, queue).await });
        Ok((session, handle))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Arc<RpcMetrics> {
        &self.inner.metrics
    }

    pub fn registry(&self) -> &Arc<PendingCallTable<S>> {
        &self.inner.registry
    }

    pub fn serializer(&self) -> &Arc<S> {
        self.inner.actions.serializer()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Next packet id. Ids start at 1 and are never reused within a session.
    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call `api` on the peer and wait for its decoded result.
    ///
    /// Applies `call_timeout` from the session config when one is set.
    pub async fn invoke<T>(&self, api: &str, arguments: CallArguments) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let response = self.call::<T>(api, arguments)?;
        match self.inner.config.call_timeout {
            Some(timeout) => response.with_timeout(timeout).await,
            None => response.await,
        }
    }

    /// Send a call and return its pending response without waiting.
    ///
    /// No deadline is applied; drop the response to abandon the call.
    pub fn call<T>(&self, api: &str, arguments: CallArguments) -> Result<PendingResponse<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if self.is_closed() {
            return Err(RpcError::ConnectionClosed);
        }
        let packet = Packet::call(self.next_id(), api, arguments.into_body());
        invoke_remote::<T, S, _>(&self.inner.outbound, &self.inner.registry, &packet)
    }

    /// Send a call without registering for its result.
    ///
    /// The peer's response, if any, finds no pending call and is dropped.
    pub fn notify(&self, api: &str, arguments: CallArguments) -> Result<()> {
        if self.is_closed() {
            return Err(RpcError::ConnectionClosed);
        }
        let packet = Packet::call(self.next_id(), api, arguments.into_body());
        self.inner.outbound.send(&packet)
    }

    /// Route one inbound packet.
    ///
    /// Responses complete their pending call inline. Calls run on a spawned
    /// task so a slow handler never stalls the reader.
    pub fn handle_packet(&self, packet: Packet) {
        if packet.is_response() {
            self.inner.responses.on_response(&packet);
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.execute(packet).await });
    }

    /// Drive the session over `io` until the peer disconnects, a transport
    /// error occurs, or [`close`](Self::close) is called.
    ///
    /// Every call still pending when the loop ends fails with
    /// [`RpcError::ConnectionClosed`].
    #[instrument(skip_all)]
    pub async fn run<IO>(&self, io: IO, mut queue: OutboundQueue) -> Result<()>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let codec = PacketCodec::new(self.inner.config.max_packet_size);
        let (mut sink, mut stream) = Framed::new(io, codec).split();

        // Reads continue while a write waits on the peer
        let reader = async {
            loop {
                match stream.next().await {
                    Some(Ok(packet)) => {
                        debug!(id = packet.id, api = %packet.api, response = packet.is_response(), "Packet received");
                        self.handle_packet(packet);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Inbound stream failed");
                        return Err(e);
                    }
                    None => {
                        debug!("Peer closed connection");
                        return Ok(());
                    }
                }
            }
        };

        let outbound = &mut queue;
        let writer = async {
            while let Some(packet) = outbound.recv().await {
                if let Err(e) = sink.send(packet).await {
                    warn!(error = %e, "Outbound write failed");
                    return Err(e);
                }
            }
            Ok(())
        };

        let result = tokio::select! {
            _ = self.inner.shutdown.notified() => {
                debug!("Session close requested");
                Ok(())
            }
            result = reader => result,
            result = writer => result,
        };

        self.inner.closed.store(true, Ordering::Release);
        drop(queue);
        let failed = self.inner.registry.fail_all(|| RpcError::ConnectionClosed);
        info!(failed_calls = failed, "Session ended");
        result
    }

    /// Stop the session. Pending calls fail with [`RpcError::ConnectionClosed`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.shutdown.notify_one();
        self.inner.registry.fail_all(|| RpcError::ConnectionClosed);
    }
}

/// Reject a serializer that reports a stock format other than the configured one.
pub(crate) fn check_serializer<S: Serializer>(
    config: &SessionConfig,
    serializer: &S,
) -> Result<()> {
    match serializer.format() {
        Some(format) if format != config.serialization => Err(RpcError::ConfigError(format!(
            "{} (table: {}, session: {})",
            constants::ERR_SERIALIZER_MISMATCH,
            format.name(),
            config.serialization.name()
        ))),
        _ => Ok(()),
    }
}

impl<S: Serializer> SessionInner<S> {
    /// Bind, run and answer one inbound call.
    async fn execute(&self, packet: Packet) {
        self.metrics.call_handled();

        let action = match self.actions.get(&packet.api) {
            Ok(action) => action,
            Err(e) => return self.fail_call(&packet, &e),
        };

        let arguments = match action.bind(self.actions.serializer(), &packet) {
            Ok(arguments) => arguments,
            Err(e) => return self.fail_call(&packet, &e),
        };

        let outcome = {
            let _timer = Timer::start(packet.api.clone());
            // Invoke inside the future so a panic before the first poll is caught too
            AssertUnwindSafe(async { action.invoke(arguments).await })
                .catch_unwind()
                .await
        };

        match outcome {
            Ok(Ok(body)) => {
                let reply = packet.reply(body);
                if let Err(e) = self.outbound.send(&reply) {
                    // The result itself could not be delivered; tell the caller why
                    self.fail_call(&packet, &e);
                }
            }
            Ok(Err(e)) => self.fail_call(&packet, &e),
            Err(_) => {
                let e = RpcError::Custom(format!("Handler for '{}' panicked", packet.api));
                self.fail_call(&packet, &e);
            }
        }
    }

    fn fail_call(&self, packet: &Packet, error: &RpcError) {
        debug!(id = packet.id, api = %packet.api, error = %error, "Call failed");
        let delivered = send_remote_failure(&self.outbound, packet, &error.failure_message());
        self.metrics.exception_sent(delivered);
    }
}
