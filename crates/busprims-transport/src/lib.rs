//! Unix domain socket transport for the busprims message bus.
//!
//! This is the lowest layer of busprims. The bus daemon listens on a
//! [`SocketListener`] and every client holds a [`BusStream`]; everything
//! above (framing, messages, routing) is built on these two types.

pub mod error;

#[cfg(unix)]
pub mod listener;
#[cfg(unix)]
pub mod stream;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use listener::SocketListener;
#[cfg(unix)]
pub use stream::{connect, BusStream, PeerCredentials};
