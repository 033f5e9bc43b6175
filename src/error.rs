//! Error types for hookstream.
//!
//! All errors in hookstream are strongly typed using thiserror.
//! Most stream operations report failure through boolean returns instead,
//! because they run inside callbacks invoked by a host whose own dispatch loop
//! must not be disturbed. The typed errors below back those booleans and cover
//! the user-initiated calls that can legitimately fail.

use thiserror::Error;

use crate::stream::StreamId;

/// Errors raised by the capability registry and alias table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{name}' is already registered")]
    Duplicate {
        name: String,
    },

    #[error("No capability registered under '{name}'")]
    NotFound {
        name: String,
    },
}

/// Errors raised by stream bookkeeping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream {id} is not a root stream and cannot {operation}")]
    InvalidDispatchTarget {
        id: StreamId,
        operation: &'static str,
    },

    #[error("Stream {child} is not attached to root {root}")]
    NotAttached {
        root: StreamId,
        child: StreamId,
    },
}

/// Errors raised by host objects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("'{shape}' has no method '{method}'")]
    UnknownMethod {
        shape: &'static str,
        method: String,
    },

    #[error("Argument {index} of '{method}' is invalid: {reason}")]
    InvalidArgument {
        method: String,
        index: usize,
        reason: String,
    },

    #[error("'{method}' requires an argument at position {index}")]
    MissingArgument {
        method: String,
        index: usize,
    },
}

/// Errors raised by calls made through a wrapped object.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterceptError {
    #[error("Property '{name}' is not callable")]
    NotCallable {
        name: String,
    },

    #[error("'{method}' expects a stream handle at position {index}")]
    MissingStreamArgument {
        method: String,
        index: usize,
    },

    #[error("Host call failed: {0}")]
    Host(#[from] HostError),
}

/// Top-level error type for hookstream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Intercept error: {0}")]
    Intercept(#[from] InterceptError),

    #[error("Invalid configuration: {message}")]
    Config {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl From<HostError> for HookError {
    fn from(err: HostError) -> Self {
        Self::Intercept(InterceptError::Host(err))
    }
}

impl HookError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a registry error.
    #[must_use]
    pub const fn is_registry(&self) -> bool {
        matches!(self, Self::Registry(_))
    }

    /// Returns true if this is a stream error.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Returns true if this is an intercept (or host) error.
    #[must_use]
    pub const fn is_intercept(&self) -> bool {
        matches!(self, Self::Intercept(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for hookstream operations.
pub type HookResult<T> = Result<T, HookError>;

/// Result type alias for host object calls.
pub type HostResult<T> = Result<T, HostError>;
