//! The bus that busprims channels talk through.
//!
//! A [`Connection`] registers names, subscribes to signals with a
//! [`MatchRule`], sends messages (optionally waiting on a [`PendingCall`]) and
//! polls for inbound traffic without blocking. Two implementations share one
//! routing core:
//!
//! - [`MemoryBus`] keeps every connection in the current process.
//! - [`SocketBus`] connects to a [`BusDaemon`] over a Unix domain socket.

pub mod connection;
pub mod control;
pub mod error;
pub mod match_rule;
pub mod memory;
pub mod pending;

mod router;

#[cfg(unix)]
pub mod client;
#[cfg(unix)]
pub mod daemon;

pub use connection::{Bus, Connection, NameReply};
pub use error::{BusError, Result};
pub use match_rule::MatchRule;
pub use memory::{MemoryBus, MemoryConnection};
pub use pending::PendingCall;
pub use router::{BUS_NAME, ERROR_SERVICE_UNKNOWN};

#[cfg(unix)]
pub use client::{SocketBus, SocketBusConfig, SocketConnection};
#[cfg(unix)]
pub use daemon::{BusDaemon, DaemonConfig};
