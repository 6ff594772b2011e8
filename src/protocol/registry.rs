//! # Pending Call Registry
//!
//! Pairs a caller's in-flight request with the response that eventually
//! arrives for it.
//!
//! Calls with different result types live in one table: each entry holds a
//! boxed [`CompletionSlot`] that knows how to decode a response body into
//! its own result type, while the caller keeps the strongly typed receiving
//! half.
//!
//! ## Invariants
//! - At most one entry per id.
//! - `take` is linearizable: an entry is handed out exactly once.
//! - A slot settles once; completing an abandoned slot is reported as `false`.

use crate::core::serialization::Serializer;
use crate::error::{constants, Result, RpcError};
use crate::utils::metrics::RpcMetrics;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, error};

/// Outcome of settling a completion slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// The waiting side was still listening and received the result
    pub accepted: bool,
    /// The slot was settled with a failure rather than a value
    pub failed: bool,
}

/// Type-erased, settle-once result slot of one pending call.
pub trait CompletionSlot<S>: Send {
    /// Name of the type the response body decodes into.
    fn value_type(&self) -> &'static str;

    /// Decode `body` with `serializer` and settle with the value, or with
    /// [`RpcError::Deserialize`] if decoding fails.
    fn complete_with_body(self: Box<Self>, serializer: &S, body: &[u8]) -> Completion;

    /// Settle with a failure.
    fn complete_with_failure(self: Box<Self>, error: RpcError) -> Completion;
}

/// Completion slot feeding a typed oneshot receiver.
pub(crate) struct TypedSlot<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> TypedSlot<T> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Result<T>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }
}

impl<T, S> CompletionSlot<S> for TypedSlot<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Serializer,
{
    fn value_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn complete_with_body(self: Box<Self>, serializer: &S, body: &[u8]) -> Completion {
        let result = serializer.deserialize::<T>(body);
        let failed = result.is_err();
        Completion {
            accepted: self.tx.send(result).is_ok(),
            failed,
        }
    }

    fn complete_with_failure(self: Box<Self>, error: RpcError) -> Completion {
        Completion {
            accepted: self.tx.send(Err(error)).is_ok(),
            failed: true,
        }
    }
}

/// A registered call awaiting its response.
pub struct PendingCall<S> {
    id: u64,
    slot: Box<dyn CompletionSlot<S>>,
}

impl<S: Serializer> PendingCall<S> {
    /// Create a pending call that resolves to `T`, returning the receiving half.
    pub fn new<T>(id: u64) -> (Self, oneshot::Receiver<Result<T>>)
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (slot, rx) = TypedSlot::<T>::channel();
        (Self::from_slot(id, Box::new(slot)), rx)
    }
}

impl<S> PendingCall<S> {
    pub fn from_slot(id: u64, slot: Box<dyn CompletionSlot<S>>) -> Self {
        Self { id, slot }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn value_type(&self) -> &'static str {
        self.slot.value_type()
    }

    pub fn complete_with_body(self, serializer: &S, body: &[u8]) -> Completion {
        self.slot.complete_with_body(serializer, body)
    }

    pub fn complete_with_failure(self, error: RpcError) -> Completion {
        self.slot.complete_with_failure(error)
    }
}

impl<S> std::fmt::Debug for PendingCall<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("value_type", &self.slot.value_type())
            .finish()
    }
}

/// Removes abandoned calls from a registry without knowing its serializer.
pub trait CallCanceller: Send + Sync {
    /// Take and discard the entry for `id`. Returns whether one was present.
    fn cancel(&self, id: u64) -> bool;

    /// Take the entry for `id` and fail it with `error`.
    fn fail(&self, id: u64, error: RpcError) -> bool;
}

/// Thread-safe map from packet id to pending call.
pub struct PendingCallTable<S> {
    calls: Mutex<HashMap<u64, PendingCall<S>>>,
    metrics: Arc<RpcMetrics>,
    _serializer: PhantomData<fn() -> S>,
}

impl<S> Default for PendingCallTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PendingCallTable<S> {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(RpcMetrics::new()))
    }

    pub fn with_metrics(metrics: Arc<RpcMetrics>) -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            metrics,
            _serializer: PhantomData,
        }
    }

    // The map has no multi-step invariants, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, PendingCall<S>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn metrics(&self) -> &Arc<RpcMetrics> {
        &self.metrics
    }

    /// Register a pending call. Ids must be unique within the session.
    pub fn add(&self, call: PendingCall<S>) -> Result<()> {
        let id = call.id();
        let mut calls = self.lock();
        if calls.contains_key(&id) {
            error!(id, "{}", constants::ERR_DUPLICATE_ID);
            return Err(RpcError::DuplicateId(id));
        }
        calls.insert(id, call);
        debug!(id, pending = calls.len(), "Registered pending call");
        Ok(())
    }

    /// Atomically remove and return the entry for `id`.
    pub fn take(&self, id: u64) -> Option<PendingCall<S>> {
        self.lock().remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ids of all pending calls, sorted (for diagnostics).
    pub fn pending_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Take every entry and fail it with an error built by `reason`.
    ///
    /// Returns the number of calls failed. Slots are settled after the lock is
    /// released.
    pub fn fail_all<F>(&self, reason: F) -> usize
    where
        F: Fn() -> RpcError,
    {
        let drained: Vec<PendingCall<S>> = self.lock().drain().map(|(_, call)| call).collect();
        let count = drained.len();
        for call in drained {
            let id = call.id();
            let completion = call.complete_with_failure(reason());
            debug!(id, accepted = completion.accepted, "Failed pending call");
        }
        if count > 0 {
            self.metrics.failed_on_close(count as u64);
        }
        count
    }
}

impl<S: Send> CallCanceller for PendingCallTable<S> {
    fn cancel(&self, id: u64) -> bool {
        let removed = self.take(id).is_some();
        if removed {
            self.metrics.call_cancelled();
            debug!(id, "Call abandoned: removed pending entry");
        }
        removed
    }

    fn fail(&self, id: u64, error: RpcError) -> bool {
        match self.take(id) {
            Some(call) => {
                self.metrics.call_cancelled();
                call.complete_with_failure(error).accepted
            }
            None => false,
        }
    }
}
