//! Session with the remote soundboard server
//!
//! Commands go over a persistent WebSocket control connection; uploads are
//! separate HTTP requests addressed by the same guild/channel identity.

pub mod client;
pub mod endpoint;
pub mod transport;

pub use client::{ConnectionState, SessionClient};
pub use endpoint::{Endpoints, SessionIdentity};
pub use transport::{Connection, RemoteEnd, Transport, WebSocketTransport};
