//! Error types and handling for the call-control library
//!
//! # Error Categories
//!
//! - **Construction Errors** - malformed addresses or configuration; raised
//!   while building identities and never enter the state machine
//! - **State Errors** - a command issued outside its legal starting states;
//!   the controller logs these and drops the gesture
//! - **Session Errors** - the engine synchronously rejected a request; the
//!   attempted transition never begins
//! - **Remote Failures** - asynchronous failures reported by the engine
//!   (busy, error, registration failure/timeout); see [`RemoteFailure`]
//!
//! # Example
//!
//! ```rust
//! use rvoip_call_control::{CallControlError, CallState};
//!
//! let err = CallControlError::illegal_state("answer", CallState::ReadyForCall);
//! assert_eq!(err.category(), "state");
//! assert!(err.is_state_error());
//! assert!(!err.is_recoverable());
//! ```

use std::fmt;

use thiserror::Error;

use crate::call::CallState;
use crate::engine::EngineError;

/// Result type alias for call-control operations
pub type CallControlResult<T> = Result<T, CallControlError>;

/// Errors raised by identities, sessions and the controller
#[derive(Error, Debug, Clone)]
pub enum CallControlError {
    /// An address string could not be parsed into an identity
    #[error("Invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("Missing required configuration: {field}")]
    MissingConfiguration { field: String },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// A command was issued while the session was not in a legal starting state
    #[error("Cannot {operation} while in state {state:?}")]
    IllegalState {
        operation: &'static str,
        state: CallState,
    },

    /// The session-protocol engine rejected the request
    #[error("Session engine rejected {operation}: {source}")]
    Session {
        operation: &'static str,
        #[source]
        source: EngineError,
    },

    /// The controller task is no longer running
    #[error("Call controller is closed")]
    ControllerClosed,
}

impl CallControlError {
    /// Create an invalid address error
    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an illegal state error
    pub fn illegal_state(operation: &'static str, state: CallState) -> Self {
        Self::IllegalState { operation, state }
    }

    /// Wrap an engine rejection
    pub fn session(operation: &'static str, source: EngineError) -> Self {
        Self::Session { operation, source }
    }

    /// Check if retrying the same request later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            CallControlError::Session { source, .. } => source.is_transient(),
            CallControlError::InvalidAddress { .. }
            | CallControlError::MissingConfiguration { .. }
            | CallControlError::InvalidConfiguration { .. }
            | CallControlError::IllegalState { .. }
            | CallControlError::ControllerClosed => false,
        }
    }

    /// Check if the error is a state-legality violation
    pub fn is_state_error(&self) -> bool {
        matches!(self, CallControlError::IllegalState { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            CallControlError::InvalidAddress { .. }
            | CallControlError::MissingConfiguration { .. }
            | CallControlError::InvalidConfiguration { .. } => "construction",
            CallControlError::IllegalState { .. } => "state",
            CallControlError::Session { .. } => "session",
            CallControlError::ControllerClosed => "system",
        }
    }
}

/// An asynchronous failure reported by the engine
///
/// Remote failures never abort the controller; they are applied to the state
/// machine and surfaced to observers as the notice of a status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// The callee is busy
    Busy,
    /// The engine reported an error for a session
    Error { cause: String },
    /// The registrar refused the registration
    RegistrationFailed { reason: String },
    /// The registrar never answered
    RegistrationTimeout,
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailure::Busy => write!(f, "Busy"),
            RemoteFailure::Error { cause } => write!(f, "Error: {}", cause),
            RemoteFailure::RegistrationFailed { reason } => {
                write!(f, "Registration failed: {}", reason)
            }
            RemoteFailure::RegistrationTimeout => write!(f, "Registration timed out"),
        }
    }
}
