//! Sink implementations
//!
//! Contains ConsoleSink. File and network destinations implement the same
//! `contracts::Sink` trait.

mod console;

pub use self::console::{ConsoleSink, ConsoleStream};
