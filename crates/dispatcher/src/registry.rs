//! SinkRegistry - named sinks and their lifecycle

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use contracts::{ConfigError, Sink, SinkError, SinkName};
use tracing::{debug, error, info, instrument};

/// Lifecycle state of a registered sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Registered, not started yet
    Initialized,
    /// Accepting records
    Started,
    /// Stopped; records routed to it are dropped
    Stopped,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Started,
            2 => Self::Stopped,
            _ => Self::Initialized,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Initialized => 0,
            Self::Started => 1,
            Self::Stopped => 2,
        }
    }
}

pub(crate) struct Entry {
    name: SinkName,
    sink: Box<dyn Sink>,
    state: AtomicU8,
    /// Appends hold the read side; `stop_all` takes the write side to drain them
    gate: RwLock<()>,
}

impl Entry {
    pub(crate) fn name(&self) -> &SinkName {
        &self.name
    }

    pub(crate) fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    pub(crate) fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Admit one append; `None` unless the sink is started.
    ///
    /// The sink cannot be stopped while the returned guard is alive.
    pub(crate) fn admit(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let guard = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        (self.state() == LifecycleState::Started).then_some(guard)
    }
}

/// Owner of every configured sink.
///
/// Names are unique. Lifecycle hooks run in registration order and one
/// sink's failure never prevents the others from being started or stopped.
#[derive(Default)]
pub struct SinkRegistry {
    entries: Vec<Entry>,
    index: HashMap<SinkName, usize>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink under a unique name
    ///
    /// # Errors
    /// `ConfigError::DuplicateName` if the name is taken; the existing
    /// entry is left unchanged.
    pub fn register(
        &mut self,
        name: impl Into<SinkName>,
        sink: impl Sink + 'static,
    ) -> Result<(), ConfigError> {
        self.register_boxed(name, Box::new(sink))
    }

    /// Register an already boxed sink (for factory)
    pub fn register_boxed(
        &mut self,
        name: impl Into<SinkName>,
        sink: Box<dyn Sink>,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ConfigError::duplicate_name(name.as_str()));
        }

        debug!(sink = %name, "Sink registered");
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Entry {
            name,
            sink,
            state: AtomicU8::new(LifecycleState::Initialized.as_u8()),
            gate: RwLock::new(()),
        });
        Ok(())
    }

    /// Resolve a sink by name
    pub fn get(&self, name: &str) -> Option<&dyn Sink> {
        self.index.get(name).map(|&i| self.entries[i].sink())
    }

    /// Lifecycle state of a sink, `None` if absent
    pub fn state(&self, name: &str) -> Option<LifecycleState> {
        self.index.get(name).map(|&i| self.entries[i].state())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Sink names in registration order
    pub fn names(&self) -> impl Iterator<Item = &SinkName> {
        self.entries.iter().map(|e| &e.name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn entry(&self, index: usize) -> &Entry {
        &self.entries[index]
    }

    /// Start every sink that is not already running
    ///
    /// Returns the sinks that failed; they stay out of the `Started` state.
    #[instrument(name = "registry_start_all", skip(self), fields(sinks = self.entries.len()))]
    pub fn start_all(&self) -> Vec<(SinkName, ConfigError)> {
        let mut failures = Vec::new();

        for entry in &self.entries {
            if entry.state() == LifecycleState::Started {
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| entry.sink.start()))
                .unwrap_or_else(|payload| {
                    Err(ConfigError::start_failed(
                        entry.name.as_str(),
                        panic_message(payload.as_ref()),
                    ))
                });

            match result {
                Ok(()) => {
                    entry.set_state(LifecycleState::Started);
                    info!(sink = %entry.name, "Sink started");
                }
                Err(e) => {
                    error!(sink = %entry.name, error = %e, "Sink failed to start");
                    failures.push((entry.name.clone(), e));
                }
            }
        }

        failures
    }

    /// Stop every sink, flushing buffered output first
    ///
    /// Appends already admitted finish before the sink's `stop` runs; later
    /// ones are refused. Every sink ends up `Stopped`, including those whose
    /// stop failed.
    #[instrument(name = "registry_stop_all", skip(self), fields(sinks = self.entries.len()))]
    pub fn stop_all(&self) -> Vec<(SinkName, SinkError)> {
        let mut failures = Vec::new();

        for entry in &self.entries {
            if entry.state() == LifecycleState::Stopped {
                continue;
            }
            // Refuse new records, then wait out the ones in flight.
            entry.set_state(LifecycleState::Stopped);
            let _drained = entry.gate.write().unwrap_or_else(PoisonError::into_inner);

            match isolate(&entry.name, || entry.sink.stop()) {
                Ok(()) => info!(sink = %entry.name, "Sink stopped"),
                Err(e) => {
                    error!(sink = %entry.name, error = %e, "Sink failed to stop");
                    failures.push((entry.name.clone(), e));
                }
            }
        }

        failures
    }

    /// Flush every sink
    pub fn flush_all(&self) -> Vec<(SinkName, SinkError)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                isolate(&entry.name, || entry.sink.flush())
                    .err()
                    .map(|e| {
                        error!(sink = %entry.name, error = %e, "Flush failed");
                        (entry.name.clone(), e)
                    })
            })
            .collect()
    }
}

/// Run a sink call, converting a panic into `SinkError::Panicked`
pub(crate) fn isolate<T>(
    sink: &SinkName,
    call: impl FnOnce() -> Result<T, SinkError>,
) -> Result<T, SinkError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(SinkError::panicked(
            sink.as_str(),
            panic_message(payload.as_ref()),
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
