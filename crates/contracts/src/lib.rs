//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace:
//! the record model, the sink capability trait, the error taxonomy and the
//! declarative pipeline configuration.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Encoding
//! Payloads are raw bytes. Layouts always emit UTF-8 and sinks never
//! transcode, so what a layout renders is what reaches the destination.

mod blueprint;
mod error;
mod record;
mod sink;
mod sink_name;

pub use blueprint::*;
pub use error::*;
pub use record::*;
pub use sink::Sink;
pub use sink_name::SinkName;
