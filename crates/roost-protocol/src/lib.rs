//! Wire protocol for Roost.
//!
//! This crate defines what the client and the remote say to each other:
//!
//! - **Types** ([`UserId`], [`EntityId`], [`Credentials`], [`LoginReply`],
//!   [`AssignedId`], [`ErrorReply`]): identities and payloads.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how payloads are
//!   converted to/from bytes.
//! - **Replies** ([`read_reply`], [`Collection`]): turning a raw
//!   [`Response`](roost_transport::Response) into a typed value, checking
//!   both the status and the in-band error marker.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (typed payloads) → Session / Cache
//! ```

mod codec;
mod error;
mod reply;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use reply::{Collection, read_reply};
pub use types::{
    AssignedId, Credentials, EntityId, ErrorMarker, ErrorReply, LoginReply, UserId,
};
