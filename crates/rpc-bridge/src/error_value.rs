//! Structured error values raised by native call logic
//!
//! An `ErrorValue` is immutable once built and cheap to clone (the payload is
//! shared). Equality is identity: two handles are equal only if they refer to
//! the same error. Causes must exist before the error wrapping them, so a
//! cause chain can never loop back on itself.

use std::fmt;
use std::sync::Arc;

use crate::value::BridgeValue;

/// Type name given to errors created without an explicit type
pub const DEFAULT_ERROR_TYPE: &str = "error";

struct ErrorInner {
    type_name: String,
    message: String,
    cause: Option<ErrorValue>,
    detail: Option<BridgeValue>,
}

/// Error value with message, optional cause and optional detail payload.
#[derive(Clone)]
pub struct ErrorValue(Arc<ErrorInner>);

impl ErrorValue {
    /// Assemble an error value. Never fails, never validates the message.
    pub fn new(
        type_name: impl Into<String>,
        message: impl Into<String>,
        cause: Option<ErrorValue>,
        detail: Option<BridgeValue>,
    ) -> Self {
        Self(Arc::new(ErrorInner {
            type_name: type_name.into(),
            message: message.into(),
            cause,
            detail,
        }))
    }

    /// Error type name
    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// Directly wrapped cause, if any
    pub fn cause(&self) -> Option<&ErrorValue> {
        self.0.cause.as_ref()
    }

    /// Detail payload, if any
    pub fn detail(&self) -> Option<&BridgeValue> {
        self.0.detail.as_ref()
    }

    /// Iterate the cause chain, starting with the direct cause
    pub fn causes(&self) -> Causes<'_> {
        Causes {
            next: self.cause(),
        }
    }

    /// Innermost error of the chain (`self` when there is no cause)
    pub fn root_cause(&self) -> &ErrorValue {
        self.causes().last().unwrap_or(self)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Build an error of the default type from a message and an optional cause.
pub fn make_error(message: impl Into<String>, cause: Option<ErrorValue>) -> ErrorValue {
    ErrorValue::new(DEFAULT_ERROR_TYPE, message, cause, None)
}

/// Iterator over an error's causes
pub struct Causes<'a> {
    next: Option<&'a ErrorValue>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a ErrorValue;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.cause();
        Some(current)
    }
}

impl PartialEq for ErrorValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ErrorValue {}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name(), self.message())
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorValue")
            .field("type_name", &self.0.type_name)
            .field("message", &self.0.message)
            .field("cause", &self.0.cause)
            .field("detail", &self.0.detail)
            .finish()
    }
}

impl std::error::Error for ErrorValue {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0
            .cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
