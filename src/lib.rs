//! Simulation of a shared broadcast medium.
//!
//! Devices attach to a [`Channel`](simulation::Channel); a transmission from
//! one of them is delivered to every other attached transducer after the
//! propagation delay, attenuated by the path loss of the configured
//! propagation model. Deliveries are scheduled on a deterministic
//! discrete-event queue in the receiving node's context.

pub mod config;
pub mod error;
pub mod scene;
pub mod simulation;

pub use config::ChannelConfig;
pub use error::{ChannelError, Result};
