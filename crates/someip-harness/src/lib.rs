//! Deterministic simulation harness for the SOME/IP stack.
//!
//! [`sim_env`] provides a virtual-time, seeded-RNG [`Environment`] so the
//! Service Discovery engine and routing host can be driven through a whole
//! scenario without real sockets or wall-clock delays, with byte-for-byte
//! replay across runs. [`invariants`] holds property checks that must hold
//! across every reachable state of a simulated node, independent of any one
//! scenario's specific sequence of events.
//!
//! [`Environment`]: someip_core::env::Environment

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod node;
pub mod sim_env;

pub use invariants::{InvariantRegistry, InvariantResult, NodeSnapshot, Violation};
pub use node::SimNode;
pub use sim_env::{SimEnv, VirtualInstant};
