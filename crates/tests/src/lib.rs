//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 -> Dispatcher -> sinks 的 e2e 测试
//! - 并发分发的完整性测试

#[cfg(test)]
mod support {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use contracts::{ConfigError, FormattedRecord, Sink, SinkConfig, SinkError};
    use dispatcher::ConsoleSink;

    /// In-memory destination shared between a sink and the test
    #[derive(Clone, Default)]
    pub struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        pub fn lines(&self) -> Vec<String> {
            self.text().lines().map(str::to_string).collect()
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

    /// Sink whose every append fails
    pub struct BrokenSink;

    impl Sink for BrokenSink {
        fn append(&self, _record: &FormattedRecord) -> Result<(), SinkError> {
            Err(SinkError::write_failed(
                "broken",
                io::Error::new(io::ErrorKind::Other, "disk full"),
            ))
        }

        fn flush(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    /// Builds a capturing console sink per declared name; `broken` fails
    #[derive(Default)]
    pub struct CaptureFactory {
        pub captures: Mutex<Vec<(String, Capture)>>,
    }

    impl CaptureFactory {
        pub fn capture(&self, name: &str) -> Capture {
            self.captures
                .lock()
                .unwrap()
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, c)| c.clone())
                .unwrap()
        }
    }

    impl dispatcher::SinkFactory for CaptureFactory {
        fn create(&self, config: &SinkConfig) -> Result<Box<dyn Sink>, ConfigError> {
            if config.name.as_str() == "broken" {
                return Ok(Box::new(BrokenSink));
            }
            let capture = Capture::default();
            self.captures
                .lock()
                .unwrap()
                .push((config.name.to_string(), capture.clone()));
            Ok(Box::new(ConsoleSink::with_writer(config.name.clone(), capture)))
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{PipelineBlueprint, RouteConfig, Severity, SinkConfig};

    #[test]
    fn test_blueprint_survives_toml_and_json() {
        let blueprint = PipelineBlueprint {
            sinks: vec![SinkConfig::console("console")],
            routes: vec![RouteConfig {
                min_severity: Some(Severity::Warn),
                logger_prefix: Some("app".to_string()),
                ..RouteConfig::to_sink("console")
            }],
            ..Default::default()
        };

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let from_toml = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(from_toml.routes[0].min_severity, Some(Severity::Warn));

        let json = ConfigLoader::to_json(&from_toml).unwrap();
        let from_json = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(from_json.sinks[0].name, "console");
        assert_eq!(from_json.routes[0].logger_prefix.as_deref(), Some("app"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::thread;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{FormattedRecord, Severity};
    use dispatcher::{create_dispatcher, layout_for, RoutingLayer};
    use observability::DispatchMetricsAggregator;
    use tracing_subscriber::layer::SubscriberExt;

    use crate::support::CaptureFactory;

    const ROUTES: &str = r#"
        layout = "message"

        [[sinks]]
        name = "all"
        sink_type = "console"

        [[sinks]]
        name = "errors"
        sink_type = "console"
        params = { target = "stderr", immediate_flush = "false" }

        [[sinks]]
        name = "broken"
        sink_type = "console"

        [[routes]]
        sink = "all"
        min_severity = "info"

        [[routes]]
        sink = "errors"
        min_severity = "error"

        [[routes]]
        sink = "broken"
    "#;

    /// Config file -> Dispatcher -> sinks
    #[test]
    fn test_config_driven_fan_out() {
        let blueprint = ConfigLoader::load_from_str(ROUTES, ConfigFormat::Toml).unwrap();
        let factory = CaptureFactory::default();
        let dispatcher = create_dispatcher(&blueprint, &factory).unwrap();
        assert!(dispatcher.start().is_empty());

        let layout = layout_for(blueprint.layout);
        for (severity, message) in [
            (Severity::Debug, "debug detail"),
            (Severity::Info, "service ready"),
            (Severity::Error, "request failed"),
        ] {
            let input = dispatcher::LayoutInput::new(severity, "app", message);
            dispatcher.dispatch(&input.to_record(layout.as_ref()));
        }

        assert_eq!(
            factory.capture("all").text(),
            "service ready\nrequest failed\n"
        );
        assert_eq!(factory.capture("errors").text(), "request failed\n");

        // The failing sink is isolated and counted.
        let broken = dispatcher.sink_metrics("broken").unwrap();
        assert_eq!(broken.failed, 3);
        assert_eq!(broken.written, 0);

        let all = dispatcher.sink_metrics("all").unwrap();
        assert_eq!(all.written, 2);
        assert_eq!(all.filtered, 1);

        assert!(dispatcher.stop().is_empty());
        dispatcher.dispatch(&FormattedRecord::new(Severity::Fatal, "app", "late\n"));
        assert_eq!(dispatcher.sink_metrics("all").unwrap().dropped, 1);
        assert!(!factory.capture("all").text().contains("late"));
    }

    /// tracing events -> RoutingLayer -> Dispatcher -> sinks
    #[test]
    fn test_tracing_events_reach_sinks() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
            layout = "detailed"

            [[sinks]]
            name = "db"
            sink_type = "console"

            [[routes]]
            sink = "db"
            logger_prefix = "app::db"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let factory = CaptureFactory::default();
        let dispatcher = Arc::new(create_dispatcher(&blueprint, &factory).unwrap());
        assert!(dispatcher.start().is_empty());

        let layer = RoutingLayer::new(Arc::clone(&dispatcher))
            .with_boxed_layout(layout_for(blueprint.layout));
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app::db", rows = 3, "slow query");
            tracing::info!(target: "app::http", "ignored");
        });

        let lines = factory.capture("db").lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("WARN  app::db: slow query rows=3"));
        assert_eq!(dispatcher.sink_metrics("db").unwrap().filtered, 1);
    }

    /// Concurrent producers never interleave bytes within a record
    #[test]
    fn test_concurrent_dispatch_keeps_records_whole() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
            [[sinks]]
            name = "all"
            sink_type = "console"

            [[routes]]
            sink = "all"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let factory = CaptureFactory::default();
        let dispatcher = Arc::new(create_dispatcher(&blueprint, &factory).unwrap());
        assert!(dispatcher.start().is_empty());

        let handles: Vec<_> = ["alpha-alpha-alpha", "beta-beta-beta-beta"]
            .into_iter()
            .map(|word| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let payload = format!("{word}\n");
                        dispatcher.dispatch(&FormattedRecord::new(Severity::Info, "t", payload));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lines = factory.capture("all").lines();
        assert_eq!(lines.len(), 2000);
        assert!(lines
            .iter()
            .all(|l| l == "alpha-alpha-alpha" || l == "beta-beta-beta-beta"));
        assert_eq!(dispatcher.sink_metrics("all").unwrap().written, 2000);
    }

    /// Dispatcher counters feed the observability summary
    #[test]
    fn test_summary_reflects_dispatch_outcomes() {
        let blueprint = ConfigLoader::load_from_str(ROUTES, ConfigFormat::Toml).unwrap();
        let factory = CaptureFactory::default();
        let dispatcher = create_dispatcher(&blueprint, &factory).unwrap();
        assert!(dispatcher.start().is_empty());

        let mut aggregator = DispatchMetricsAggregator::new();
        for _ in 0..4 {
            dispatcher.dispatch(&FormattedRecord::new(Severity::Error, "app", "x\n"));
            aggregator.record_dispatch(std::time::Duration::from_micros(5));
        }

        let summary = aggregator.summary(dispatcher.metrics());
        assert_eq!(summary.records, 4);
        assert_eq!(summary.total_failed(), 4);
        assert!(summary.to_string().contains("errors: written=4"));
    }
}
