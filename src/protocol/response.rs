use crate::core::packet::Packet;
use crate::core::serialization::Serializer;
use crate::error::{RemoteFailure, RpcError};
use crate::protocol::registry::PendingCallTable;
use std::sync::Arc;
use tracing::{debug, trace};

/// Completes pending calls from inbound response packets.
pub struct ResponseDispatcher<S> {
    registry: Arc<PendingCallTable<S>>,
    serializer: Arc<S>,
}

impl<S> Clone for ResponseDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            serializer: Arc::clone(&self.serializer),
        }
    }
}

impl<S: Serializer> ResponseDispatcher<S> {
    pub fn new(registry: Arc<PendingCallTable<S>>, serializer: Arc<S>) -> Self {
        Self {
            registry,
            serializer,
        }
    }

    pub fn registry(&self) -> &Arc<PendingCallTable<S>> {
        &self.registry
    }

    /// Resolve the pending call matching `packet.id`.
    ///
    /// A response with no pending call is dropped and reported as handled.
    /// Otherwise the return value tells whether the waiting caller accepted
    /// the completion; `false` only means it had already gone away.
    pub fn on_response(&self, packet: &Packet) -> bool {
        let metrics = self.registry.metrics();
        let Some(call) = self.registry.take(packet.id) else {
            metrics.response_dropped();
            debug!(id = packet.id, api = %packet.api, "Response with no pending call dropped");
            return true;
        };
        metrics.response_matched();

        let completion = if packet.is_exception() {
            metrics.remote_failure();
            let failure = RemoteFailure::from_body(&packet.body);
            debug!(id = packet.id, message = %failure.message(), "Remote failure received");
            call.complete_with_failure(RpcError::Remote(failure))
        } else {
            let value_type = call.value_type();
            let completion = call.complete_with_body(&self.serializer, &packet.body);
            if completion.failed {
                metrics.decode_failure();
                debug!(id = packet.id, value_type, "Response body failed to decode");
            }
            completion
        };

        if !completion.accepted {
            trace!(id = packet.id, "Caller no longer waiting");
        }
        completion.accepted
    }
}
