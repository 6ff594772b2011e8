//! # Remote Call Issuance
//!
//! Registers a pending call, sends the request, and hands the caller a
//! [`PendingResponse`] that resolves when the matching response is dispatched.
//!
//! ## Cancellation Policy
//! Nothing here enforces a deadline. Dropping a [`PendingResponse`] before it
//! resolves takes its entry out of the registry, so a late response becomes a
//! harmless no-op. [`PendingResponse::with_timeout`] applies a caller-chosen
//! deadline and fails the call with [`RpcError::Timeout`] when it elapses.

use crate::core::packet::Packet;
use crate::core::serialization::Serializer;
use crate::error::{Result, RpcError};
use crate::protocol::registry::{CallCanceller, PendingCall, PendingCallTable};
use crate::transport::Session;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

/// Future resolving to the result of one remote call.
#[must_use = "dropping a PendingResponse cancels the call"]
pub struct PendingResponse<T> {
    id: u64,
    rx: oneshot::Receiver<Result<T>>,
    canceller: Arc<dyn CallCanceller>,
    settled: bool,
}

impl<T> std::fmt::Debug for PendingResponse<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("id", &self.id)
            .field("settled", &self.settled)
            .finish()
    }
}

impl<T> PendingResponse<T> {
    /// Packet id this response is correlated by.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Abandon the call now. The entry is removed from the registry and a
    /// late response is dropped.
    pub fn cancel(mut self) {
        self.abandon();
    }

    /// Wait at most `timeout` for the response.
    ///
    /// On expiry the entry is taken from the registry and failed, so the
    /// caller receives [`RpcError::Timeout`]. If a response claimed the entry
    /// first, its result is returned instead.
    pub async fn with_timeout(mut self, timeout: Duration) -> Result<T> {
        match tokio::time::timeout(timeout, &mut self).await {
            Ok(result) => result,
            Err(_) => {
                if !self.canceller.fail(self.id, RpcError::Timeout) {
                    // Whoever holds the entry completes or drops it
                    debug!(id = self.id, "Deadline lost to a claimed response");
                    return (&mut self).await;
                }
                self.settled = true;
                warn!(id = self.id, timeout_ms = timeout.as_millis() as u64, "Call timed out");
                Err(RpcError::Timeout)
            }
        }
    }

    fn abandon(&mut self) {
        if !self.settled {
            self.settled = true;
            self.canceller.cancel(self.id);
        }
    }
}

impl<T> Future for PendingResponse<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(result) => {
                self.settled = true;
                // A dropped sender means the entry was discarded without a result
                Poll::Ready(result.unwrap_or(Err(RpcError::Cancelled)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for PendingResponse<T> {
    fn drop(&mut self) {
        self.abandon();
    }
}

/// Issue a remote call and return a future for its decoded result.
///
/// The pending entry is registered strictly before the packet is sent, so a
/// response that races ahead of this function's return still finds it. If the
/// send fails the entry is removed again and the send error is returned.
#[instrument(skip_all, fields(id = packet.id, api = %packet.api))]
pub fn invoke_remote<T, S, X>(
    session: &X,
    registry: &Arc<PendingCallTable<S>>,
    packet: &Packet,
) -> Result<PendingResponse<T>>
where
    T: DeserializeOwned + Send + 'static,
    S: Serializer,
    X: Session + ?Sized,
{
    let (call, rx) = PendingCall::<S>::new::<T>(packet.id);
    registry.add(call)?;

    if let Err(e) = session.send(packet) {
        registry.take(packet.id);
        warn!(error = %e, "Send failed, pending call removed");
        return Err(e);
    }

    registry.metrics().call_issued();
    debug!(value_type = std::any::type_name::<T>(), "Call sent");

    let canceller: Arc<dyn CallCanceller> = registry.clone();
    Ok(PendingResponse {
        id: packet.id,
        rx,
        canceller,
        settled: false,
    })
}
