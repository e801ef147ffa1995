//! Run statistics.

use std::fmt;
use std::time::Duration;

use observability::DispatchSummary;

/// Statistics from a `run` invocation
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Input lines read, blank ones included
    pub lines_read: u64,

    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Whether the run ended on a shutdown signal rather than EOF
    pub interrupted: bool,

    /// Per-sink dispatch summary
    pub summary: DispatchSummary,
}

impl RunStats {
    /// Records dispatched per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.summary.records as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        writeln!(f, "Lines read: {}", self.lines_read)?;
        writeln!(
            f,
            "Duration: {:.2}s ({:.1} records/s){}",
            self.duration.as_secs_f64(),
            self.throughput(),
            if self.interrupted { ", interrupted" } else { "" }
        )
    }
}
