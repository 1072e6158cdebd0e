//! ## kanal-core::network
//! **Network condition models**
//!
//! ### Key Submodules:
//! - `delay/`: per-message delay models (Gaussian, fixed, none)
//!
//! Packet loss and partitions are not modelled: every envelope that enters the
//! wire is delivered exactly once.

pub mod delay;
