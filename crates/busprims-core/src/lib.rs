//! Message shaping and dispatch on top of a busprims bus.
//!
//! A [`BusChannel`] binds one interface and one local name to its own
//! connection. [`send`] builds a message from a [`MessageSpec`] and either
//! broadcasts it or blocks on the reply, depending on whether the channel
//! has a target. On the receiving side a [`Dispatcher`] polls one channel,
//! decodes known signals and answers known calls; a [`ListenerSupervisor`]
//! runs one dispatcher per channel on its own thread.
//!
//! ```
//! use busprims_bus::MemoryBus;
//! use busprims_core::{send, BusChannel, ChannelConfig, MessageSpec};
//!
//! let bus = MemoryBus::new();
//! let config = ChannelConfig::broadcast("/test/signal/Object", "test.signal.Type", "test.signal.source");
//! let mut channel = BusChannel::open(&bus, config)?;
//! let spec = MessageSpec::new("msg000").with("asdf").with(234);
//! assert_eq!(send(&mut channel, &spec)?, None);
//! # Ok::<(), busprims_core::CoreError>(())
//! ```

pub mod builder;
pub mod channel;
pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod reply;
pub mod sender;
pub mod spec;
pub mod supervisor;

pub use builder::build_message;
pub use channel::{BusChannel, ChannelConfig, DEFAULT_REPLY_TIMEOUT};
pub use config::{BusConfig, InterfaceConfig, InterfaceKind};
pub use decoder::{decode, first_string, DecodedField, FieldMismatch, Fields};
pub use dispatcher::{
    DispatchConfig, DispatchStats, Dispatcher, ReceivedSignal, SignalSink, Step,
    DEFAULT_POLL_INTERVAL, DEFAULT_REPLY_DELAY,
};
pub use error::{CoreError, Result};
pub use reply::{handle_call, DEFAULT_REPLY_PREFIX};
pub use sender::{send, send_cancellable, send_to};
pub use spec::MessageSpec;
pub use supervisor::{ListenerReport, ListenerSupervisor};
