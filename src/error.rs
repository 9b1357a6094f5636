use crate::channels::ChannelState;
use thiserror::Error as ThisError;

/// Failures raised by the radio/mesh transport underneath a cluster handle.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("device is unreachable")]
    Unreachable,
}

impl TransportError {
    /// Whether retrying later (or on the next reporting cycle) can succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TransportError::Unreachable)
    }
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cannot {action} a channel in state {from}")]
    InvalidState {
        from: ChannelState,
        action: &'static str,
    },

    #[error("reporting could not be configured for: {}", attributes.join(", "))]
    ConfigurationPartialFailure { attributes: Vec<String> },

    #[error("operation cancelled")]
    Cancelled,
}

impl ChannelError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            ChannelError::Transport(e) => e.is_recoverable(),
            ChannelError::ConfigurationPartialFailure { .. } => true,
            ChannelError::InvalidState { .. } | ChannelError::Cancelled => false,
        }
    }
}

#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_is_not_recoverable() {
        assert!(!TransportError::Unreachable.is_recoverable());
        assert!(
            TransportError::Timeout {
                operation: "read".into()
            }
            .is_recoverable()
        );
        assert!(ChannelError::from(TransportError::Delivery("nwk".into())).is_recoverable());
        assert!(!ChannelError::from(TransportError::Unreachable).is_recoverable());
    }

    #[test]
    fn test_partial_failure_lists_attributes() {
        let err = ChannelError::ConfigurationPartialFailure {
            attributes: vec!["current_x".into(), "color_temperature".into()],
        };
        assert_eq!(
            err.to_string(),
            "reporting could not be configured for: current_x, color_temperature"
        );
    }
}
