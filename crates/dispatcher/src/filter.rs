//! Route filters
//!
//! A filter is an opaque predicate over a record. Closures work directly;
//! the built-ins cover what the declarative config can express.

use contracts::{FormattedRecord, RouteConfig, Severity};

/// Decides whether a record travels down a route
pub trait RecordFilter: Send + Sync {
    fn matches(&self, record: &FormattedRecord) -> bool;
}

impl<F> RecordFilter for F
where
    F: Fn(&FormattedRecord) -> bool + Send + Sync,
{
    fn matches(&self, record: &FormattedRecord) -> bool {
        self(record)
    }
}

/// Inclusive severity range; an open bound matches everything on that side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityFilter {
    min: Option<Severity>,
    max: Option<Severity>,
}

impl SeverityFilter {
    pub fn at_least(min: Severity) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: Severity) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn between(min: Severity, max: Severity) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

impl RecordFilter for SeverityFilter {
    fn matches(&self, record: &FormattedRecord) -> bool {
        let severity = record.severity();
        self.min.is_none_or(|min| severity >= min) && self.max.is_none_or(|max| severity <= max)
    }
}

/// Matches a logger and everything nested under it.
///
/// Both `::` (Rust module paths) and `.` (dotted logger names) count as
/// separators, so `app` matches `app`, `app::db` and `app.db` but not
/// `application`. A trailing separator on the prefix is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerPrefixFilter {
    prefix: String,
}

impl LoggerPrefixFilter {
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        let kept = prefix.trim_end_matches([':', '.']).len();
        prefix.truncate(kept);
        Self { prefix }
    }
}

impl RecordFilter for LoggerPrefixFilter {
    fn matches(&self, record: &FormattedRecord) -> bool {
        match record.logger_name().strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with("::") || rest.starts_with('.'),
            None => false,
        }
    }
}

/// Conjunction of filters; empty matches everything
#[derive(Default)]
pub struct AllOf(Vec<Box<dyn RecordFilter>>);

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: impl RecordFilter + 'static) -> Self {
        self.0.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl RecordFilter for AllOf {
    fn matches(&self, record: &FormattedRecord) -> bool {
        self.0.iter().all(|f| f.matches(record))
    }
}

/// Compile a route declaration into a filter; `None` when unfiltered
pub fn from_route_config(route: &RouteConfig) -> Option<Box<dyn RecordFilter>> {
    if !route.is_filtered() {
        return None;
    }

    let mut all = AllOf::new();
    if route.min_severity.is_some() || route.max_severity.is_some() {
        all = all.and(SeverityFilter {
            min: route.min_severity,
            max: route.max_severity,
        });
    }
    if let Some(prefix) = &route.logger_prefix {
        all = all.and(LoggerPrefixFilter::new(prefix.clone()));
    }

    if all.len() == 1 {
        all.0.pop()
    } else {
        Some(Box::new(all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(severity: Severity, logger: &str) -> FormattedRecord {
        FormattedRecord::new(severity, logger, "payload\n")
    }

    #[test]
    fn test_severity_threshold() {
        let filter = SeverityFilter::at_least(Severity::Info);
        assert!(!filter.matches(&record(Severity::Debug, "app")));
        assert!(filter.matches(&record(Severity::Info, "app")));
        assert!(filter.matches(&record(Severity::Fatal, "app")));
    }

    #[test]
    fn test_severity_range() {
        let filter = SeverityFilter::between(Severity::Debug, Severity::Warn);
        assert!(!filter.matches(&record(Severity::Trace, "app")));
        assert!(filter.matches(&record(Severity::Warn, "app")));
        assert!(!filter.matches(&record(Severity::Error, "app")));

        let filter = SeverityFilter::at_most(Severity::Info);
        assert!(filter.matches(&record(Severity::Trace, "app")));
        assert!(!filter.matches(&record(Severity::Warn, "app")));
    }

    #[test]
    fn test_logger_prefix_boundaries() {
        let filter = LoggerPrefixFilter::new("app");
        assert!(filter.matches(&record(Severity::Info, "app")));
        assert!(filter.matches(&record(Severity::Info, "app::db")));
        assert!(filter.matches(&record(Severity::Info, "app.net.http")));
        assert!(!filter.matches(&record(Severity::Info, "application")));
        assert!(!filter.matches(&record(Severity::Info, "other::app")));
    }

    #[test]
    fn test_logger_prefix_trailing_separator() {
        for prefix in ["app::", "app."] {
            let filter = LoggerPrefixFilter::new(prefix);
            assert!(filter.matches(&record(Severity::Info, "app::db")));
            assert!(filter.matches(&record(Severity::Info, "app.db")));
            assert!(filter.matches(&record(Severity::Info, "app")));
            assert!(!filter.matches(&record(Severity::Info, "application")));
        }
    }

    #[test]
    fn test_closure_filter() {
        let filter = |r: &FormattedRecord| r.payload().starts_with(b"pay");
        assert!(filter.matches(&record(Severity::Info, "x")));
    }

    #[test]
    fn test_from_route_config() {
        assert!(from_route_config(&RouteConfig::to_sink("console")).is_none());

        let route = RouteConfig {
            min_severity: Some(Severity::Warn),
            logger_prefix: Some("app".to_string()),
            ..RouteConfig::to_sink("console")
        };
        let filter = from_route_config(&route).unwrap();
        assert!(filter.matches(&record(Severity::Error, "app::db")));
        assert!(!filter.matches(&record(Severity::Info, "app::db")));
        assert!(!filter.matches(&record(Severity::Error, "lib")));
    }
}
