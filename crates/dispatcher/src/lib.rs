//! # Dispatcher
//!
//! 日志记录分发模块。
//!
//! 负责：
//! - 管理具名 sink 及其生命周期 (`SinkRegistry`)
//! - 按 route 过滤并 fan-out 到多个 sinks
//! - 隔离失败的 sink，不影响调用方与其他 sink
//! - 通过 `RoutingLayer` 接入 `tracing`

pub mod dispatcher;
pub mod factory;
pub mod filter;
pub mod layer;
pub mod layout;
pub mod metrics;
pub mod registry;
pub mod sinks;

pub use contracts::{FormattedRecord, Severity, Sink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, Route};
pub use factory::{DefaultSinkFactory, SinkFactory};
pub use filter::{AllOf, LoggerPrefixFilter, RecordFilter, SeverityFilter};
pub use layer::RoutingLayer;
pub use layout::{layout_for, DetailedLayout, Layout, LayoutInput, MessageLayout};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use registry::{LifecycleState, SinkRegistry};
pub use sinks::{ConsoleSink, ConsoleStream};
