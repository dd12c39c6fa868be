//! Shared-medium channel simulation core.
//!
//! ## Module Organization
//!
//! - `types`: Core data structures (time, positions, tx modes, packets, PDPs)
//! - `scheduler`: Discrete-event queue with per-node execution context
//! - `signal_calculations`: Path loss, absorption and ambient noise formulas
//! - `geometry`: Distance helpers
//! - `propagation` / `noise`: Pluggable physics models
//! - `device`: Nodes, net devices and transducers attached to a channel
//! - `registry`: Ordered attachment list of a channel
//! - `channel`: Transmission fan-out and lifecycle
//! - `log_capture`: Per-node capture of log records emitted during events

pub mod channel;
pub mod device;
pub mod geometry;
pub mod log_capture;
pub mod noise;
pub mod propagation;
pub mod registry;
pub mod scheduler;
pub mod signal_calculations;
pub mod types;

// Re-export commonly used types
pub use channel::{Channel, ChannelHandle, ChannelStats};
pub use device::{BasicNetDevice, DeviceHandle, NetDevice, Node, RecordingTransducer, Transducer, TransducerHandle};
pub use noise::NoiseModel;
pub use propagation::PropagationModel;
pub use scheduler::{EventQueue, Scheduler};
pub use types::{NodeId, Packet, Pdp, Point, SimTime, TxMode};
