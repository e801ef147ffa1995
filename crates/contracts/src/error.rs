//! Layered error definitions
//!
//! Split by when they surface: `ConfigError` at setup time, `SinkError`
//! per record (never returned to the logging call site).

use thiserror::Error;

/// Setup-time errors, surfaced to the operator.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A sink with this name is already registered
    #[error("duplicate sink name '{name}'")]
    DuplicateName { name: String },

    /// A route references a sink that does not exist
    #[error("route references unknown sink '{sink}'")]
    UnresolvedRoute { sink: String },

    /// Configuration parse error
    #[error("config parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    Validation { field: String, message: String },

    /// Sink failed to acquire its resources
    #[error("sink '{sink}' failed to start: {message}")]
    StartFailed { sink: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    pub fn unresolved_route(sink: impl Into<String>) -> Self {
        Self::UnresolvedRoute { sink: sink.into() }
    }

    /// Create configuration parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn start_failed(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StartFailed {
            sink: sink.into(),
            message: message.into(),
        }
    }
}

/// Per-record sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the payload failed (e.g. broken pipe)
    #[error("sink '{sink}' write failed: {source}")]
    WriteFailed {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    /// Flushing buffered output failed
    #[error("sink '{sink}' flush failed: {source}")]
    FlushFailed {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    /// A previous writer panicked while holding the sink lock
    #[error("sink '{sink}' lock poisoned")]
    Poisoned { sink: String },

    /// The sink panicked during a call
    #[error("sink '{sink}' panicked: {message}")]
    Panicked { sink: String, message: String },
}

impl SinkError {
    pub fn write_failed(sink: impl Into<String>, source: std::io::Error) -> Self {
        Self::WriteFailed {
            sink: sink.into(),
            source,
        }
    }

    pub fn flush_failed(sink: impl Into<String>, source: std::io::Error) -> Self {
        Self::FlushFailed {
            sink: sink.into(),
            source,
        }
    }

    pub fn poisoned(sink: impl Into<String>) -> Self {
        Self::Poisoned { sink: sink.into() }
    }

    pub fn panicked(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Panicked {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Name of the sink that produced the error
    pub fn sink(&self) -> &str {
        match self {
            Self::WriteFailed { sink, .. }
            | Self::FlushFailed { sink, .. }
            | Self::Poisoned { sink }
            | Self::Panicked { sink, .. } => sink,
        }
    }
}
