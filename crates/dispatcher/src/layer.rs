//! RoutingLayer - feeds `tracing` events into a Dispatcher

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use contracts::Severity;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::dispatcher::Dispatcher;
use crate::layout::{Layout, LayoutInput, MessageLayout};

/// Target prefix of this crate's own diagnostics, never routed
const INTERNAL_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `tracing_subscriber` layer that renders each event and dispatches it.
///
/// The event's target becomes the logger name. Events emitted by the
/// dispatcher itself are skipped so that sink diagnostics cannot feed back
/// into the sinks.
pub struct RoutingLayer {
    dispatcher: Arc<Dispatcher>,
    layout: Box<dyn Layout>,
}

impl RoutingLayer {
    /// Route with [`MessageLayout`]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            layout: Box::new(MessageLayout),
        }
    }

    pub fn with_layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Box::new(layout);
        self
    }

    pub fn with_boxed_layout(mut self, layout: Box<dyn Layout>) -> Self {
        self.layout = layout;
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl<S: Subscriber> Layer<S> for RoutingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_internal(metadata.target()) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let input = LayoutInput {
            severity: severity_from_level(metadata.level()),
            timestamp: SystemTime::now(),
            logger_name: metadata.target(),
            message: &visitor.message,
            fields: &visitor.fields,
        };
        self.dispatcher.dispatch(&input.to_record(self.layout.as_ref()));
    }
}

/// Map a `tracing` level onto a record severity
///
/// `tracing` has no fatal level; `ERROR` maps to `Severity::Error`.
pub fn severity_from_level(level: &Level) -> Severity {
    if *level == Level::ERROR {
        Severity::Error
    } else if *level == Level::WARN {
        Severity::Warn
    } else if *level == Level::INFO {
        Severity::Info
    } else if *level == Level::DEBUG {
        Severity::Debug
    } else {
        Severity::Trace
    }
}

fn is_internal(target: &str) -> bool {
    target
        .strip_prefix(INTERNAL_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Route;
    use crate::filter::SeverityFilter;
    use crate::layout::DetailedLayout;
    use crate::registry::SinkRegistry;
    use crate::sinks::ConsoleSink;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn dispatcher(out: &Capture, min: Severity) -> Arc<Dispatcher> {
        let mut registry = SinkRegistry::new();
        registry
            .register("console", ConsoleSink::with_writer("console", out.clone()))
            .unwrap();
        let dispatcher = Dispatcher::builder(registry)
            .route(Route::new("console").with_filter(SeverityFilter::at_least(min)))
            .build();
        dispatcher.start();
        Arc::new(dispatcher)
    }

    #[test]
    fn test_events_reach_console() {
        let out = Capture::default();
        let layer = RoutingLayer::new(dispatcher(&out, Severity::Info));
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("not routed");
            tracing::info!("hello");
            tracing::warn!(user = 7, "careful");
        });

        assert_eq!(out.text(), "hello\ncareful\n");
    }

    #[test]
    fn test_detailed_layout_includes_target_and_fields() {
        let out = Capture::default();
        let layer =
            RoutingLayer::new(dispatcher(&out, Severity::Trace)).with_layout(DetailedLayout);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app::db", table = "users", "write failed");
        });

        let text = out.text();
        assert!(text.contains(" ERROR app::db: write failed table=users\n"), "{text}");
    }

    #[test]
    fn test_internal_events_are_skipped() {
        assert!(is_internal("dispatcher"));
        assert!(is_internal("dispatcher::registry"));
        assert!(!is_internal("dispatcher_ext"));
        assert!(!is_internal("app"));

        let out = Capture::default();
        let subscriber =
            tracing_subscriber::registry().with(RoutingLayer::new(dispatcher(&out, Severity::Trace)));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "dispatcher::dispatcher", "diagnostic");
        });
        assert!(out.text().is_empty());
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(severity_from_level(&Level::ERROR), Severity::Error);
        assert_eq!(severity_from_level(&Level::WARN), Severity::Warn);
        assert_eq!(severity_from_level(&Level::TRACE), Severity::Trace);
    }
}
