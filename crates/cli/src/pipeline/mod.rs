//! Record ingestion: input parsing and run statistics.

mod input;
mod stats;

pub use input::{InputFormat, InputRecord};
pub use stats::RunStats;
