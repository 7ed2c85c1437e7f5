//! Named-interface signals and blocking calls over a small message bus.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket streams and listeners
//! - [`frame`]: length-prefixed frames carrying control and bus messages
//! - [`message`]: typed arguments and bus messages
//! - [`bus`]: connections, name ownership, routing and the socket daemon
//! - [`core`]: channels, senders, decoding and per-channel dispatch
//!
//! The `busprims` binary (feature `cli`) drives all of the above from the
//! command line.

/// Re-export transport types.
pub mod transport {
    pub use busprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use busprims_frame::*;
}

/// Re-export message types.
pub mod message {
    pub use busprims_message::*;
}

/// Re-export bus types.
pub mod bus {
    pub use busprims_bus::*;
}

/// Re-export channel and dispatch types.
pub mod core {
    pub use busprims_core::*;
}
