//! # kanal-core
//!
//! In-process simulated network transport for testing distributed algorithms.
//! N logical processes exchange [`Envelope`]s through a shared [`Transport`]
//! that applies a randomized per-message delay, without any real sockets.
//!
//! ### Key Submodules:
//! - `envelope`: message values and process ids
//! - `wire`: capacity-bounded FIFO shared by all senders
//! - `buffer`: per-destination delivery buffers
//! - `network`: delay models
//! - `time`: wall and manual clocks
//! - `transport`: send, broadcast, deliver and drain
//!
//! ```
//! use kanal_core::prelude::*;
//!
//! let transport = Transport::builder(3)
//!     .delay_model(NoDelayModel)
//!     .build()
//!     .unwrap();
//! let envelope = Envelope::new(ProcessId::new(0), ProcessId::new(1), MessageKind::Proposal, 1, 5);
//! transport.send(envelope).unwrap();
//! assert_eq!(transport.deliver(ProcessId::new(1)).unwrap(), Some(envelope));
//! ```

pub mod buffer;
pub mod envelope;
pub mod error;
pub mod network;
pub mod time;
pub mod transport;
pub mod wire;

pub mod prelude {
    pub use crate::buffer::DeliveryBuffer;
    pub use crate::envelope::*;
    pub use crate::error::*;
    pub use crate::network::delay::*;
    pub use crate::time::*;
    pub use crate::transport::*;
}

pub use envelope::{Envelope, MessageKind, ProcessId, ScheduledEnvelope};
pub use error::{BroadcastError, TransportError};
pub use transport::{DrainTarget, Transport, TransportBuilder, TransportSnapshot};
