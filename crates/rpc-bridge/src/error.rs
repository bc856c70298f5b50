//! Error types for the bridge

use crate::error_value::ErrorValue;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// Stored value cannot be read as the requested kind
    #[error("Type mismatch on field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        /// Field or native-data key
        field: String,
        /// Requested kind
        expected: String,
        /// Kind actually stored
        got: String,
    },

    /// Write to a field the descriptor marks readonly
    #[error("Field '{field}' of '{type_name}' is readonly")]
    ReadonlyField {
        /// Object type name
        type_name: String,
        /// Field name
        field: String,
    },

    /// Write to a field the descriptor does not declare
    #[error("Field '{field}' not found in '{type_name}'")]
    UnknownField {
        /// Object type name
        type_name: String,
        /// Field name
        field: String,
    },

    /// No method registered under this name
    #[error("Method '{0}' not found")]
    UnknownMethod(String),

    /// Native call logic raised an error; carried unmodified
    #[error("{0}")]
    Application(ErrorValue),

    /// The scheduler dropped a started call without running it
    #[error("Call '{0}' was abandoned before completion")]
    Abandoned(String),

    /// No record type registered under this name
    #[error("Record type '{0}' not found")]
    UnknownRecordType(String),

    /// No object type registered under this name
    #[error("Object type '{0}' not found")]
    UnknownObjectType(String),

    /// Construction-time validation failed
    #[error("Validation failed for '{type_name}': {reason}")]
    Validation {
        /// Type being constructed
        type_name: String,
        /// What was wrong
        reason: String,
    },

    /// Anonymous type index beyond the type table
    #[error("Anonymous type index {index} out of range (table has {len} entries)")]
    AnonTypeOutOfRange {
        /// Requested index
        index: usize,
        /// Table length
        len: usize,
    },

    /// Anonymous type slot exists but is not registered under this qualifier
    #[error("Anonymous type {index} is not registered for '{qualifier}'")]
    AnonTypeUnregistered {
        /// Requested index
        index: usize,
        /// Requested qualifier
        qualifier: String,
    },

    /// Factory does not implement this capability
    #[error("Value factory does not support {0}")]
    Unsupported(&'static str),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// The application error this failure forwards, if any
    pub fn as_application(&self) -> Option<&ErrorValue> {
        match self {
            BridgeError::Application(err) => Some(err),
            _ => None,
        }
    }

    /// Consume into the forwarded application error, if any
    pub fn into_application(self) -> Option<ErrorValue> {
        match self {
            BridgeError::Application(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ErrorValue> for BridgeError {
    fn from(err: ErrorValue) -> Self {
        BridgeError::Application(err)
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}
