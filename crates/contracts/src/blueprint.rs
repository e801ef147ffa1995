//! PipelineBlueprint - Config Loader output
//!
//! Declares the named sinks, the routes feeding them and the layout used to
//! render records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{ConfigError, Severity, SinkName};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// How records are rendered before they reach a sink
    #[serde(default)]
    pub layout: LayoutKind,

    /// Named sink instances
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,

    /// Routes from records to sinks
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl PipelineBlueprint {
    /// Find a sink declaration by name
    pub fn sink(&self, name: &str) -> Option<&SinkConfig> {
        self.sinks.iter().find(|s| s.name == *name)
    }
}

/// Layout selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// Message followed by a newline
    #[default]
    Message,
    /// Timestamp, level, logger, message and fields
    Detailed,
}

/// Sink declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Unique sink name
    pub name: SinkName,

    /// Sink type
    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    /// Console sink writing to stdout with default params
    pub fn console(name: impl Into<SinkName>) -> Self {
        Self {
            name: name.into(),
            sink_type: SinkType::Console,
            params: HashMap::new(),
        }
    }
}

/// Standard stream a console sink writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Typed view of a console sink's `params`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleParams {
    pub target: ConsoleTarget,
    /// Flush after every record
    pub immediate_flush: bool,
}

impl Default for ConsoleParams {
    fn default() -> Self {
        Self {
            target: ConsoleTarget::Stdout,
            immediate_flush: true,
        }
    }
}

impl ConsoleParams {
    /// Parse `target` and `immediate_flush`; other keys are rejected
    pub fn from_params(
        sink: &str,
        params: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut parsed = Self::default();

        for (key, value) in params {
            let field = || format!("sinks[{sink}].params.{key}");
            match key.as_str() {
                "target" => {
                    parsed.target = match value.to_ascii_lowercase().as_str() {
                        "stdout" => ConsoleTarget::Stdout,
                        "stderr" => ConsoleTarget::Stderr,
                        other => {
                            return Err(ConfigError::validation(
                                field(),
                                format!("expected 'stdout' or 'stderr', got '{other}'"),
                            ))
                        }
                    }
                }
                "immediate_flush" => {
                    parsed.immediate_flush = value.parse().map_err(|_| {
                        ConfigError::validation(
                            field(),
                            format!("expected 'true' or 'false', got '{value}'"),
                        )
                    })?
                }
                _ => return Err(ConfigError::validation(field(), "unknown console parameter")),
            }
        }

        Ok(parsed)
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Process standard output / error
    Console,
}

/// Route declaration: which records reach which sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Target sink name
    pub sink: SinkName,

    /// Lowest severity delivered (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_severity: Option<Severity>,

    /// Highest severity delivered (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_severity: Option<Severity>,

    /// Only loggers equal to or nested under this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger_prefix: Option<String>,
}

impl RouteConfig {
    /// Unfiltered route to `sink`
    pub fn to_sink(sink: impl Into<SinkName>) -> Self {
        Self {
            sink: sink.into(),
            min_severity: None,
            max_severity: None,
            logger_prefix: None,
        }
    }

    /// Whether the route carries any filter condition
    pub fn is_filtered(&self) -> bool {
        self.min_severity.is_some() || self.max_severity.is_some() || self.logger_prefix.is_some()
    }
}
