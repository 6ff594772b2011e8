//! # Core Protocol Components
//!
//! Packet layout, stream framing and the serializer boundary.
//!
//! ## Components
//! - **Packet**: correlation id, flags, api name and body
//! - **Codec**: Tokio codec for framing packets over byte streams
//! - **Serialization**: the encode/decode contract and its stock formats
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Version(1)] [Length(4)] [Id(8)] [Flags(1)] [ApiLen(1)] [Api(N)] [Body(M)]
//! ```
//!
//! ## Security
//! - Maximum packet size: 16MB by default (prevents memory exhaustion)
//! - Length validation before buffering the body

pub mod codec;
pub mod packet;
pub mod serialization;
