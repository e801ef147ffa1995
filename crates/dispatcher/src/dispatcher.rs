//! Dispatcher - synchronous fan-out of records to routed sinks

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use contracts::{ConfigError, FormattedRecord, PipelineBlueprint, SinkError, SinkName};

use crate::factory::SinkFactory;
use crate::filter::{self, RecordFilter};
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::registry::{isolate, SinkRegistry};

/// A (sink name, optional filter) pairing
pub struct Route {
    sink: SinkName,
    filter: Option<Box<dyn RecordFilter>>,
}

impl Route {
    /// Unfiltered route to `sink`
    pub fn new(sink: impl Into<SinkName>) -> Self {
        Self {
            sink: sink.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl RecordFilter + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Build from a route declaration
    pub fn from_config(config: &contracts::RouteConfig) -> Self {
        Self {
            sink: config.sink.clone(),
            filter: filter::from_route_config(config),
        }
    }

    pub fn sink(&self) -> &SinkName {
        &self.sink
    }
}

/// Route with its sink resolved once at build time
struct ResolvedRoute {
    sink: SinkName,
    filter: Option<Box<dyn RecordFilter>>,
    /// Registry index; `None` disables the route
    target: Option<usize>,
    metrics: Arc<SinkMetrics>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    registry: SinkRegistry,
    routes: Vec<Route>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder over a populated registry
    pub fn new(registry: SinkRegistry) -> Self {
        Self {
            registry,
            routes: Vec::new(),
        }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Resolve routes against the registry
    ///
    /// Routes naming an unknown sink are kept but disabled; the first record
    /// that reaches one emits a single warning.
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sinks = self.registry.len(), routes = self.routes.len())
    )]
    pub fn build(self) -> Dispatcher {
        let mut metrics: Vec<(SinkName, Arc<SinkMetrics>)> = self
            .registry
            .names()
            .map(|name| (name.clone(), Arc::new(SinkMetrics::new())))
            .collect();
        let mut by_name: HashMap<SinkName, Arc<SinkMetrics>> = metrics
            .iter()
            .map(|(name, m)| (name.clone(), Arc::clone(m)))
            .collect();

        let routes = self
            .routes
            .into_iter()
            .map(|route| {
                let target = self.registry.index_of(&route.sink);
                if target.is_none() {
                    debug!(sink = %route.sink, "Route references unregistered sink");
                }
                let route_metrics = by_name
                    .entry(route.sink.clone())
                    .or_insert_with(|| {
                        let m = Arc::new(SinkMetrics::new());
                        metrics.push((route.sink.clone(), Arc::clone(&m)));
                        m
                    })
                    .clone();

                ResolvedRoute {
                    sink: route.sink,
                    filter: route.filter,
                    target,
                    metrics: route_metrics,
                }
            })
            .collect();

        Dispatcher {
            registry: self.registry,
            routes,
            metrics,
        }
    }
}

/// Fans each record out to every matching route.
///
/// `dispatch` runs on the caller's thread and never returns an error: sink
/// failures are counted per sink and reported once. The dispatcher takes no
/// lock of its own, so it can be shared across threads behind an `Arc`.
pub struct Dispatcher {
    registry: SinkRegistry,
    routes: Vec<ResolvedRoute>,
    metrics: Vec<(SinkName, Arc<SinkMetrics>)>,
}

impl Dispatcher {
    pub fn builder(registry: SinkRegistry) -> DispatcherBuilder {
        DispatcherBuilder::new(registry)
    }

    /// Deliver one record to every route whose filter accepts it
    pub fn dispatch(&self, record: &FormattedRecord) {
        for route in &self.routes {
            if let Some(filter) = &route.filter {
                match isolate(&route.sink, || Ok(filter.matches(record))) {
                    Ok(true) => {}
                    Ok(false) => {
                        route.metrics.inc_filtered();
                        continue;
                    }
                    Err(e) => {
                        self.report_failure(route, &e);
                        continue;
                    }
                }
            }

            let Some(index) = route.target else {
                if route.metrics.inc_unresolved() == 0 {
                    warn!(
                        sink = %route.sink,
                        "Route references unknown sink, records for it are discarded"
                    );
                }
                continue;
            };

            let entry = self.registry.entry(index);
            let Some(_admitted) = entry.admit() else {
                route.metrics.inc_dropped();
                continue;
            };

            match isolate(entry.name(), || entry.sink().append(record)) {
                Ok(()) => route.metrics.inc_written(),
                Err(e) => self.report_failure(route, &e),
            }
        }
    }

    fn report_failure(&self, route: &ResolvedRoute, err: &SinkError) {
        let previous = route.metrics.inc_failed();
        if previous == 0 {
            error!(
                sink = %route.sink,
                error = %err,
                "Route delivery failed, further failures are logged at debug level"
            );
        } else {
            debug!(sink = %route.sink, error = %err, failures = previous + 1, "Route delivery failed");
        }
    }

    /// Start every registered sink
    pub fn start(&self) -> Vec<(SinkName, ConfigError)> {
        self.registry.start_all()
    }

    /// Stop every registered sink, flushing first
    pub fn stop(&self) -> Vec<(SinkName, SinkError)> {
        self.registry.stop_all()
    }

    pub fn flush(&self) -> Vec<(SinkName, SinkError)> {
        self.registry.flush_all()
    }

    pub fn registry(&self) -> &SinkRegistry {
        &self.registry
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Metrics per sink: registered sinks first, then unknown route targets
    pub fn metrics(&self) -> Vec<(SinkName, MetricsSnapshot)> {
        self.metrics
            .iter()
            .map(|(name, m)| (name.clone(), m.snapshot()))
            .collect()
    }

    /// Metrics of one sink
    pub fn sink_metrics(&self, name: &str) -> Option<MetricsSnapshot> {
        self.metrics
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, m)| m.snapshot())
    }
}

/// Build a dispatcher from a validated blueprint
///
/// Sinks are created through `factory` and registered in declaration order;
/// routes follow the declaration order too. Sinks are not started.
#[instrument(
    name = "dispatcher_create",
    skip(blueprint, factory),
    fields(sinks = blueprint.sinks.len(), routes = blueprint.routes.len())
)]
pub fn create_dispatcher(
    blueprint: &PipelineBlueprint,
    factory: &dyn SinkFactory,
) -> Result<Dispatcher, ConfigError> {
    let mut registry = SinkRegistry::new();
    for config in &blueprint.sinks {
        let sink = factory.create(config)?;
        registry.register_boxed(config.name.clone(), sink)?;
    }

    let dispatcher = DispatcherBuilder::new(registry)
        .routes(blueprint.routes.iter().map(Route::from_config))
        .build();

    info!(
        sinks = dispatcher.registry().len(),
        routes = dispatcher.route_count(),
        "Dispatcher created"
    );
    Ok(dispatcher)
}
