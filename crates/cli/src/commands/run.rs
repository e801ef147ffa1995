//! `run` command implementation.

use std::future::Future;
use std::time::Instant;

use anyhow::{Context, Result};
use dispatcher::{create_dispatcher, layout_for, DefaultSinkFactory, Dispatcher, Layout, LayoutInput};
use observability::DispatchMetricsAggregator;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{InputFormat, InputRecord, RunStats};

/// Publish dispatcher counters every this many records
const METRICS_EXPORT_INTERVAL: u64 = 1024;

/// Execute the `run` command
pub async fn run_dispatch(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let dispatcher = create_dispatcher(&blueprint, &DefaultSinkFactory)
        .context("Failed to build dispatcher")?;
    let layout = layout_for(blueprint.layout);

    let failures = dispatcher.start();
    if !failures.is_empty() {
        let message = failures
            .iter()
            .map(|(sink, e)| format!("{sink}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        dispatcher.stop();
        return Err(CliError::start_failed(message).into());
    }

    let format = if args.plain {
        InputFormat::Plain
    } else {
        InputFormat::JsonLines
    };

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    info!(
        sinks = dispatcher.registry().len(),
        routes = dispatcher.route_count(),
        ?format,
        "Dispatching records"
    );

    let result = dispatch_lines(
        reader,
        &dispatcher,
        layout.as_ref(),
        format,
        &args.logger,
        shutdown_signal(),
    )
    .await;

    // Sinks are stopped even when reading failed part-way.
    for (sink, e) in dispatcher.stop() {
        warn!(sink = %sink, error = %e, "Sink failed to stop cleanly");
    }

    let stats = result?;
    observability::record_dispatcher_metrics(&dispatcher.metrics());
    eprint!("\n{stats}");

    info!(
        records = stats.summary.records,
        failed = stats.summary.total_failed(),
        "logroute finished"
    );
    Ok(())
}

/// Read `reader` line by line and dispatch every record until EOF or `shutdown`
///
/// Needs the multi-threaded runtime: dispatch runs under `block_in_place`.
pub async fn dispatch_lines<R, F>(
    reader: R,
    dispatcher: &Dispatcher,
    layout: &dyn Layout,
    format: InputFormat,
    default_logger: &str,
    shutdown: F,
) -> Result<RunStats>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let mut aggregator = DispatchMetricsAggregator::new();
    let mut lines = reader.lines();
    let mut lines_read = 0u64;
    let mut interrupted = false;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    debug!(lines_read, "End of input");
                    break;
                };
                lines_read += 1;

                let record = match InputRecord::parse(&line, lines_read, format) {
                    Ok(Some(record)) => record,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(error = %e, "Skipping input line");
                        observability::record_input_line(false);
                        aggregator.record_rejected();
                        continue;
                    }
                };
                observability::record_input_line(true);

                let fields = record.rendered_fields();
                let input = LayoutInput::new(
                    record.severity,
                    record.logger_or(default_logger),
                    &record.message,
                )
                .with_fields(&fields);
                let formatted = input.to_record(layout);

                // Sinks write synchronously; keep the worker's other tasks moving
                // when stdout is a slow pipe.
                let dispatch_started = Instant::now();
                tokio::task::block_in_place(|| dispatcher.dispatch(&formatted));
                aggregator.record_dispatch(dispatch_started.elapsed());

                if aggregator.records % METRICS_EXPORT_INTERVAL == 0 {
                    observability::record_dispatcher_metrics(&dispatcher.metrics());
                }
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping dispatch...");
                interrupted = true;
                break;
            }
        }
    }

    Ok(RunStats {
        lines_read,
        duration: started.elapsed(),
        interrupted,
        summary: aggregator.summary(dispatcher.metrics()),
    })
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigError, PipelineBlueprint, RouteConfig, Severity, Sink, SinkConfig};
    use dispatcher::{ConsoleSink, DetailedLayout, MessageLayout};
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncWriteExt;

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

    fn dispatcher_with(routes: Vec<RouteConfig>) -> (Dispatcher, Capture) {
        let capture = Capture::default();
        let blueprint = PipelineBlueprint {
            sinks: vec![SinkConfig::console("out")],
            routes,
            ..Default::default()
        };
        let writer = capture.clone();
        let factory = move |config: &SinkConfig| -> Result<Box<dyn Sink>, ConfigError> {
            Ok(Box::new(ConsoleSink::with_writer(config.name.clone(), writer.clone())))
        };
        let dispatcher = create_dispatcher(&blueprint, &factory).unwrap();
        assert!(dispatcher.start().is_empty());
        (dispatcher, capture)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_json_lines() {
        let route = RouteConfig {
            min_severity: Some(Severity::Info),
            ..RouteConfig::to_sink("out")
        };
        let (dispatcher, capture) = dispatcher_with(vec![route]);

        let input = concat!(
            r#"{"severity":"debug","message":"hidden"}"#,
            "\n",
            r#"{"severity":"error","logger":"app","message":"shown"}"#,
            "\n",
            "not json\n",
            "\n",
        );

        let stats = dispatch_lines(
            input.as_bytes(),
            &dispatcher,
            &MessageLayout,
            InputFormat::JsonLines,
            "stdin",
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(capture.text(), "shown\n");
        assert_eq!(stats.lines_read, 4);
        assert_eq!(stats.summary.records, 2);
        assert_eq!(stats.summary.rejected_lines, 1);
        assert!(!stats.interrupted);

        let snapshot = dispatcher.sink_metrics("out").unwrap();
        assert_eq!(snapshot.written, 1);
        assert_eq!(snapshot.filtered, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_plain_lines_with_default_logger() {
        let route = RouteConfig {
            logger_prefix: Some("batch".to_string()),
            ..RouteConfig::to_sink("out")
        };
        let (dispatcher, capture) = dispatcher_with(vec![route]);

        let stats = dispatch_lines(
            "first\nsecond\n".as_bytes(),
            &dispatcher,
            &DetailedLayout,
            InputFormat::Plain,
            "batch",
            std::future::pending(),
        )
        .await
        .unwrap();

        let text = capture.text();
        assert_eq!(stats.summary.records, 2);
        assert!(text.contains("INFO  batch: first\n"));
        assert!(text.contains("INFO  batch: second\n"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_stops_reading() {
        let (dispatcher, capture) = dispatcher_with(vec![RouteConfig::to_sink("out")]);
        let (mut tx, rx) = tokio::io::duplex(64);
        tx.write_all(b"one\n").await.unwrap();

        let stats = dispatch_lines(
            BufReader::new(rx),
            &dispatcher,
            &MessageLayout,
            InputFormat::Plain,
            "stdin",
            tokio::time::sleep(std::time::Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert!(stats.interrupted);
        assert_eq!(capture.text(), "one\n");
        drop(tx);
    }
}
