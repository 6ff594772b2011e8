//! # fast-rpc
//!
//! Call correlation and dispatch for a binary RPC protocol carried over
//! persistent, full-duplex connections.
//!
//! Either side of a connection may call the other. A caller registers a
//! pending call under a fresh packet id before the call packet leaves, and
//! the peer's response packet (same id, `RESPONSE` flag) completes it. On the
//! callee side, inbound call bodies are bound to the action's declared
//! parameter types, the action runs, and its result or failure message is
//! sent back.
//!
//! ## Layout
//! - [`core`]: packet framing, codec, pluggable value serialization
//! - [`protocol`]: pending-call registry, response dispatch, remote
//!   invocation, exception marshaling, parameter binding, action table
//! - [`transport`]: session send boundary, session driver, Unix sockets
//! - [`config`]: TOML / environment configuration
//! - [`utils`]: logging setup and metrics
//!
//! ## Example
//! ```rust,no_run
//! use fast_rpc::{ActionTable, CallArguments, ParameterType, RpcSession, SerializationFormat};
//! use fast_rpc::config::SessionConfig;
//! use std::sync::Arc;
//!
//! # async fn demo() -> fast_rpc::Result<()> {
//! let format = SerializationFormat::Bincode;
//! let actions = Arc::new(ActionTable::new(Arc::new(format)));
//! actions.register_fn(
//!     "add",
//!     vec![ParameterType::of::<i32>(), ParameterType::of::<i32>()],
//!     |mut args| Ok(args.take::<i32>(0)? + args.take::<i32>(1)?),
//! )?;
//!
//! let (client, server) = tokio::io::duplex(64 * 1024);
//! let (_server, _) = RpcSession::spawn(server, SessionConfig::default(), Arc::clone(&actions))?;
//! let (client, _) = RpcSession::spawn(client, SessionConfig::default(), actions)?;
//!
//! let args = CallArguments::new().push(&format, &2i32)?.push(&format, &3i32)?;
//! let sum: i32 = client.invoke("add", args).await?;
//! assert_eq!(sum, 5);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::packet::{Packet, PacketFlags};
pub use crate::core::serialization::{SerializationFormat, Serializer};
pub use crate::error::{RemoteFailure, Result, RpcError};
pub use crate::protocol::binder::{bind_parameters, Arguments, CallArguments, ParameterType};
pub use crate::protocol::call::{invoke_remote, PendingResponse};
pub use crate::protocol::dispatcher::ActionTable;
pub use crate::protocol::exception::send_remote_failure;
pub use crate::protocol::registry::{PendingCall, PendingCallTable};
pub use crate::protocol::response::ResponseDispatcher;
pub use crate::transport::session::RpcSession;
pub use crate::transport::Session;
