use crate::core::packet::{Packet, MAX_API_NAME_LEN};
use crate::core::serialization::Serializer;
use crate::error::{constants, Result, RpcError};
use crate::protocol::binder::{bind_parameters, Arguments, ParameterType};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Future produced by a handler: the encoded result value.
pub type HandlerFuture = BoxFuture<'static, Result<Vec<u8>>>;

type InvokerFn = dyn Fn(Arguments) -> HandlerFuture + Send + Sync + 'static;

/// A remotely callable action: its declared parameters and its invoker.
pub struct ApiAction<S> {
    name: String,
    parameter_types: Vec<ParameterType<S>>,
    invoker: Box<InvokerFn>,
}

impl<S> std::fmt::Debug for ApiAction<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAction")
            .field("name", &self.name)
            .field("parameter_types", &self.parameter_types)
            .finish()
    }
}

impl<S> ApiAction<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[ParameterType<S>] {
        &self.parameter_types
    }

    /// Bind the call body of `packet` to this action's parameters.
    pub fn bind(&self, serializer: &S, packet: &Packet) -> Result<Arguments> {
        bind_parameters(serializer, &self.parameter_types, packet)
    }

    /// Run the handler with bound arguments.
    pub fn invoke(&self, arguments: Arguments) -> HandlerFuture {
        (self.invoker)(arguments)
    }
}

/// Explicit registration table of callable actions, keyed by api name.
///
/// Populated at startup; lookups take a shared read lock.
pub struct ActionTable<S> {
    serializer: Arc<S>,
    actions: RwLock<HashMap<String, Arc<ApiAction<S>>>>,
}

impl<S: Serializer> ActionTable<S> {
    pub fn new(serializer: Arc<S>) -> Self {
        Self {
            serializer,
            actions: RwLock::new(HashMap::new()),
        }
    }

    pub fn serializer(&self) -> &Arc<S> {
        &self.serializer
    }

    /// Register an async handler under `name`.
    ///
    /// The handler's return value is encoded with the table's serializer.
    pub fn register<R, F, Fut>(
        &self,
        name: &str,
        parameter_types: Vec<ParameterType<S>>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let serializer = Arc::clone(&self.serializer);
        let invoker = move |arguments: Arguments| -> HandlerFuture {
            let pending = handler(arguments);
            let serializer = Arc::clone(&serializer);
            Box::pin(async move {
                let value = pending.await?;
                serializer.serialize(&value)
            })
        };
        self.insert(ApiAction {
            name: name.to_string(),
            parameter_types,
            invoker: Box::new(invoker),
        })
    }

    /// Register a synchronous handler under `name`.
    pub fn register_fn<R, F>(
        &self,
        name: &str,
        parameter_types: Vec<ParameterType<S>>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(Arguments) -> Result<R> + Send + Sync + 'static,
        R: Serialize + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.register(name, parameter_types, move |arguments| {
            let handler = Arc::clone(&handler);
            async move { handler(arguments) }
        })
    }

    fn insert(&self, action: ApiAction<S>) -> Result<()> {
        if action.name.len() > MAX_API_NAME_LEN {
            return Err(RpcError::Custom(
                constants::ERR_API_NAME_TOO_LONG.to_string(),
            ));
        }

        let mut actions = self
            .actions
            .write()
            .map_err(|_| RpcError::Custom(constants::ERR_TABLE_WRITE_LOCK.to_string()))?;

        if actions.contains_key(&action.name) {
            return Err(RpcError::DuplicateApi(action.name));
        }

        debug!(
            api = %action.name,
            parameters = action.parameter_types.len(),
            "Registered api action"
        );
        actions.insert(action.name.clone(), Arc::new(action));
        Ok(())
    }

    /// Look up the action registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<ApiAction<S>>> {
        let actions = self
            .actions
            .read()
            .map_err(|_| RpcError::Custom(constants::ERR_TABLE_READ_LOCK.to_string()))?;

        actions
            .get(name)
            .cloned()
            .ok_or_else(|| RpcError::ApiNotFound(name.to_string()))
    }

    /// Registered api names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.actions.read() {
            Ok(actions) => actions.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}
