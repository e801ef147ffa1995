//! Sink trait - Dispatcher output interface
//!
//! Defines the capability contract every output destination implements.

use crate::{ConfigError, FormattedRecord, SinkError};

/// Output destination for formatted records.
///
/// All methods take `&self`: a sink is shared by every thread that logs and
/// must serialize its own writes. The dispatcher never holds a lock around
/// a sink call.
pub trait Sink: Send + Sync {
    /// Acquire resources before the first record
    fn start(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Write one record
    ///
    /// # Errors
    /// Returns the failure with the underlying cause. Callers record it;
    /// it is never propagated to the code that emitted the log call.
    fn append(&self, record: &FormattedRecord) -> Result<(), SinkError>;

    /// Force buffered bytes to the destination. Must be idempotent.
    fn flush(&self) -> Result<(), SinkError>;

    /// Release resources, flushing first
    fn stop(&self) -> Result<(), SinkError> {
        self.flush()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn start(&self) -> Result<(), ConfigError> {
        (**self).start()
    }

    fn append(&self, record: &FormattedRecord) -> Result<(), SinkError> {
        (**self).append(record)
    }

    fn flush(&self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn stop(&self) -> Result<(), SinkError> {
        (**self).stop()
    }
}
