//! Cifrazia Action Transport System: a framed, bidirectional request/response
//! protocol engine over a single TCP connection (spec.md §1, §2).
//!
//! Process-level bootstrap — CLI parsing, configuration file loading, TLS
//! termination — is out of scope; embed [`Server`] in a binary that builds a
//! [`ServerConfig`] and a [`Router`] however it prefers.

pub mod channels;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod frame;
pub mod handler;
pub mod handshake;
pub mod message_id;
pub mod router;
pub mod server;
pub mod spool;

pub use channels::{ChannelRegistry, ConnectionHandle, ConnectionId, ALL_CHANNEL};
pub use config::{ConnReader, ConnWriter, ServerConfig};
pub use connection::Connection;
pub use error::{CatsError, CodecError, HandshakeError, ProtocolError};
pub use events::{Event, EventBus, EventPayload};
pub use frame::{Compression, DataType, FileEntry, FrameType, MessageHeaders};
pub use handler::{HandlerFn, InputPort, InputRejected, Request, Response};
pub use handshake::{Handshake, Sha256TimeHandshake};
pub use router::Router;
pub use server::Server;
pub use spool::Spooled;
