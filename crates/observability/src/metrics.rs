//! 分发指标收集模块
//!
//! 将 Dispatcher 的 sink 计数器导出到 `metrics`，并在内存中聚合摘要。

use std::fmt;
use std::time::Duration;

use contracts::SinkName;
use dispatcher::MetricsSnapshot;
use metrics::{counter, histogram};

/// 导出单个 sink 的累计计数
///
/// 快照为累计值，计数器直接设置为绝对值。
pub fn record_sink_snapshot(sink: &str, snapshot: &MetricsSnapshot) {
    let outcomes = [
        ("written", snapshot.written),
        ("failed", snapshot.failed),
        ("filtered", snapshot.filtered),
        ("unresolved", snapshot.unresolved),
        ("dropped", snapshot.dropped),
    ];
    for (outcome, value) in outcomes {
        counter!(
            "logroute_sink_records_total",
            "sink" => sink.to_string(),
            "outcome" => outcome
        )
        .absolute(value);
    }
}

/// 导出全部 sink
pub fn record_dispatcher_metrics(snapshots: &[(SinkName, MetricsSnapshot)]) {
    for (sink, snapshot) in snapshots {
        record_sink_snapshot(sink, snapshot);
    }
}

/// 记录输入行解析结果
pub fn record_input_line(parsed: bool) {
    let status = if parsed { "parsed" } else { "rejected" };
    counter!("logroute_input_lines_total", "status" => status).increment(1);
}

/// 记录单条记录的分发耗时
pub fn record_dispatch_latency(latency: Duration) {
    histogram!("logroute_dispatch_latency_us").record(latency.as_secs_f64() * 1e6);
}

/// 分发指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DispatchMetricsAggregator {
    /// 分发的记录数
    pub records: u64,

    /// 被拒绝的输入行
    pub rejected_lines: u64,

    /// 分发耗时 (微秒)
    pub latency_us: RunningStats,
}

impl DispatchMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次分发
    pub fn record_dispatch(&mut self, latency: Duration) {
        self.records += 1;
        self.latency_us.push(latency.as_secs_f64() * 1e6);
        record_dispatch_latency(latency);
    }

    /// 记录一条被拒绝的输入行
    pub fn record_rejected(&mut self) {
        self.rejected_lines += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self, sinks: Vec<(SinkName, MetricsSnapshot)>) -> DispatchSummary {
        DispatchSummary {
            records: self.records,
            rejected_lines: self.rejected_lines,
            latency_us: StatsSummary::from(&self.latency_us),
            sinks,
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub records: u64,
    pub rejected_lines: u64,
    pub latency_us: StatsSummary,
    pub sinks: Vec<(SinkName, MetricsSnapshot)>,
}

impl DispatchSummary {
    /// 所有 sink 的失败次数之和
    pub fn total_failed(&self) -> u64 {
        self.sinks.iter().map(|(_, s)| s.failed).sum()
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Records dispatched: {}", self.records)?;
        writeln!(f, "Rejected input lines: {}", self.rejected_lines)?;
        writeln!(f, "Dispatch latency (us): {}", self.latency_us)?;

        if !self.sinks.is_empty() {
            writeln!(f, "Sinks:")?;
            for (sink, s) in &self.sinks {
                writeln!(
                    f,
                    "  {}: written={} failed={} filtered={} unresolved={} dropped={}",
                    sink, s.written, s.failed, s.filtered, s.unresolved, s.dropped
                )?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
