//! # Call Correlation and Dispatch
//!
//! ## Components
//! - **Registry**: pending calls keyed by packet id
//! - **Call**: registering, sending and awaiting a remote call
//! - **Response**: completing pending calls from response packets
//! - **Exception**: returning a local failure to the remote caller
//! - **Binder**: decoding call segments into declared parameter types
//! - **Dispatcher**: the explicit table of callable actions
//!
//! ## Flow
//! ```text
//! caller ── add(id) ── send ─────────────▶ peer
//!    ▲                                       │
//!    └── complete ◀── take(id) ◀── response ◀┘
//! ```

pub mod binder;
pub mod call;
pub mod dispatcher;
pub mod exception;
pub mod registry;
pub mod response;
