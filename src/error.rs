//! Error types for the channel simulator.
//!
//! Every failure in the channel core is fatal for the run: there is no I/O in
//! the dispatcher and no partially applied transmission, so callers abort
//! instead of retrying.

use thiserror::Error;

/// Errors raised by the channel, its registry and the model factory.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChannelError {
    /// A required model is not set, a model name is unknown, or a parameter is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transmit was called with a transducer that is not attached to this channel.
    #[error("invariant violation: transducer is not attached to this channel")]
    UnknownTransducer,

    /// Indexed registry access outside `0..count`.
    #[error("device index {index} out of range (channel has {count} devices)")]
    DeviceIndexOutOfRange { index: usize, count: usize },

    /// The channel has been disposed and can no longer be used.
    #[error("channel has been disposed")]
    Disposed,
}

impl ChannelError {
    /// All channel errors abort the run; none of them is transient.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// True for the configuration class of errors (missing or invalid setup).
    pub fn is_configuration(&self) -> bool {
        matches!(self, ChannelError::Configuration(_) | ChannelError::Disposed)
    }
}

/// Type alias for Result with the channel error type.
pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(ChannelError::Configuration("x".into()).is_configuration());
        assert!(ChannelError::Disposed.is_configuration());
        assert!(!ChannelError::UnknownTransducer.is_configuration());
        assert!(ChannelError::UnknownTransducer.is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = ChannelError::DeviceIndexOutOfRange { index: 3, count: 2 };
        assert_eq!(err.to_string(), "device index 3 out of range (channel has 2 devices)");
        let err = ChannelError::Configuration("propagation model not set".into());
        assert_eq!(err.to_string(), "configuration error: propagation model not set");
    }
}
