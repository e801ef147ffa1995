//! ConsoleSink - writes rendered records to stdout / stderr

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use contracts::{ConsoleParams, ConsoleTarget, FormattedRecord, Sink, SinkError, SinkName};
use tracing::debug;

/// Process standard stream selected by [`ConsoleTarget`]
#[derive(Debug)]
pub enum ConsoleStream {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

impl ConsoleStream {
    pub fn new(target: ConsoleTarget) -> Self {
        match target {
            ConsoleTarget::Stdout => Self::Stdout(io::stdout()),
            ConsoleTarget::Stderr => Self::Stderr(io::stderr()),
        }
    }
}

impl Write for ConsoleStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(out) => out.write(buf),
            Self::Stderr(err) => err.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // Keep the std lock for the whole payload, not per partial write.
        match self {
            Self::Stdout(out) => out.lock().write_all(buf),
            Self::Stderr(err) => err.lock().write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(out) => out.flush(),
            Self::Stderr(err) => err.flush(),
        }
    }
}

/// Sink that writes each payload verbatim to a console stream.
///
/// The writer sits behind the sink's own mutex, so concurrent appends land
/// as whole payloads. The lock belongs to this sink only; other sinks are
/// never serialized against it.
pub struct ConsoleSink<W = ConsoleStream> {
    name: SinkName,
    writer: Mutex<W>,
    immediate_flush: bool,
}

impl ConsoleSink<ConsoleStream> {
    /// Console sink on standard output
    pub fn stdout(name: impl Into<SinkName>) -> Self {
        Self::new(name, ConsoleTarget::Stdout)
    }

    pub fn new(name: impl Into<SinkName>, target: ConsoleTarget) -> Self {
        Self::with_writer(name, ConsoleStream::new(target))
    }

    /// Create from validated config params (for factory)
    pub fn from_params(name: impl Into<SinkName>, params: ConsoleParams) -> Self {
        Self::new(name, params.target).immediate_flush(params.immediate_flush)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Console sink over an arbitrary writer
    pub fn with_writer(name: impl Into<SinkName>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
            immediate_flush: true,
        }
    }

    /// Flush after every append (default `true`)
    pub fn immediate_flush(mut self, enabled: bool) -> Self {
        self.immediate_flush = enabled;
        self
    }

    pub fn name(&self) -> &SinkName {
        &self.name
    }

    /// Consume the sink and return the writer
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|_| SinkError::poisoned(self.name.as_str()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, W>, SinkError> {
        self.writer
            .lock()
            .map_err(|_| SinkError::poisoned(self.name.as_str()))
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn append(&self, record: &FormattedRecord) -> Result<(), SinkError> {
        let payload = record.payload();
        if payload.is_empty() {
            return Ok(());
        }

        let mut writer = self.lock()?;
        writer
            .write_all(payload)
            .map_err(|e| SinkError::write_failed(self.name.as_str(), e))?;

        if self.immediate_flush {
            writer
                .flush()
                .map_err(|e| SinkError::flush_failed(self.name.as_str(), e))?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.lock()?
            .flush()
            .map_err(|e| SinkError::flush_failed(self.name.as_str(), e))
    }

    fn stop(&self) -> Result<(), SinkError> {
        self.flush()?;
        debug!(sink = %self.name, "ConsoleSink stopped");
        Ok(())
    }
}
