//! Input line parsing.
//!
//! JSON lines look like `{"severity":"warn","logger":"app::db","message":"slow"}`;
//! `severity` defaults to `info`, `logger` to the configured fallback and
//! any `fields` object is rendered by layouts that show fields.

use std::collections::BTreeMap;

use contracts::Severity;
use serde::Deserialize;

use crate::error::{CliError, Result};

/// How each input line is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    JsonLines,
    Plain,
}

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputRecord {
    #[serde(default = "default_severity")]
    pub severity: Severity,

    #[serde(default)]
    pub logger: Option<String>,

    pub message: String,

    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

fn default_severity() -> Severity {
    Severity::Info
}

impl InputRecord {
    /// Parse `line`; `Ok(None)` for blank lines
    pub fn parse(line: &str, line_no: u64, format: InputFormat) -> Result<Option<Self>> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() {
            return Ok(None);
        }

        match format {
            InputFormat::Plain => Ok(Some(Self {
                severity: Severity::Info,
                logger: None,
                message: trimmed.to_string(),
                fields: BTreeMap::new(),
            })),
            InputFormat::JsonLines => serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|e| CliError::invalid_record(line_no, e.to_string())),
        }
    }

    /// Logger name, falling back to `default`
    pub fn logger_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.logger.as_deref().unwrap_or(default)
    }

    /// Fields as `key=value` strings, in key order
    pub fn rendered_fields(&self) -> Vec<(&str, String)> {
        self.fields
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.as_str(), value)
            })
            .collect()
    }
}
