use crate::bus::AttributeAddress;
use m2k_types::Transport;

#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("Unable to create a context for uri: {uri}")]
    ContextUnavailable { uri: String },

    #[error("The {transport} transport is not handled by this bus")]
    UnsupportedTransport { transport: Transport },

    #[error("Scope not found: {scope}")]
    ScopeNotFound { scope: String },

    #[error("Attribute not found: {attribute}")]
    AttributeNotFound { attribute: AttributeAddress },

    #[error("Attribute is read only: {attribute}")]
    ReadOnly { attribute: AttributeAddress },

    #[error("Malformed value '{value}' read from {attribute}")]
    Malformed {
        attribute: AttributeAddress,
        value: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum HalError {
    #[error("No device found: {target}")]
    NoDevice {
        target: String,
        #[source]
        source: Option<BusError>,
    },

    #[error("{message} ({scope})")]
    InvalidParameter { scope: String, message: String },

    #[error(
        "The provided value ({ordinal}) for {attribute} is not supported on the current board, \
         only {supported} values are available; Check the firmware version."
    )]
    UnsupportedValue {
        attribute: AttributeAddress,
        ordinal: usize,
        supported: usize,
    },

    #[error("Unexpected value '{value}' read from attribute: {attribute}")]
    UnexpectedHardwareValue {
        attribute: AttributeAddress,
        value: String,
    },

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl HalError {
    pub(crate) fn no_device(target: impl Into<String>, source: Option<BusError>) -> Self {
        HalError::NoDevice {
            target: target.into(),
            source,
        }
    }

    pub(crate) fn invalid(scope: &str, message: impl Into<String>) -> Self {
        HalError::InvalidParameter {
            scope: scope.to_owned(),
            message: message.into(),
        }
    }
}
