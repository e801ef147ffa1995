//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::{PipelineBlueprint, RouteConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    layout: String,
    sinks: Vec<SinkInfo>,
    routes: Vec<RouteInfo>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct RouteInfo {
    sink: String,
    filter: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sinks = blueprint
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.to_string(),
            sink_type: format!("{:?}", s.sink_type),
            params: if args.params {
                s.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    let routes = blueprint
        .routes
        .iter()
        .map(|r| RouteInfo {
            sink: r.sink.to_string(),
            filter: describe_filter(r),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        layout: format!("{:?}", blueprint.layout),
        sinks,
        routes,
    }
}

/// Human-readable filter condition of a route
fn describe_filter(route: &RouteConfig) -> String {
    let mut parts = Vec::new();
    match (route.min_severity, route.max_severity) {
        (Some(min), Some(max)) => parts.push(format!("{min}..={max}")),
        (Some(min), None) => parts.push(format!(">= {min}")),
        (None, Some(max)) => parts.push(format!("<= {max}")),
        (None, None) => {}
    }
    if let Some(prefix) = &route.logger_prefix {
        parts.push(format!("logger {prefix}"));
    }

    if parts.is_empty() {
        "all records".to_string()
    } else {
        parts.join(", ")
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("logroute configuration");
    println!("   ├─ Version: {}", info.version);
    println!("   └─ Layout: {}", info.layout);

    println!("\nSinks ({})", info.sinks.len());
    for (i, sink) in info.sinks.iter().enumerate() {
        let prefix = if i == info.sinks.len() - 1 { "└─" } else { "├─" };
        println!("   {} {} ({})", prefix, sink.name, sink.sink_type);
        for (key, value) in &sink.params {
            println!("   {}     {} = {}", if prefix == "└─" { " " } else { "│" }, key, value);
        }
    }

    println!("\nRoutes ({})", info.routes.len());
    for (i, route) in info.routes.iter().enumerate() {
        let prefix = if i == info.routes.len() - 1 { "└─" } else { "├─" };
        println!("   {} -> {} [{}]", prefix, route.sink, route.filter);
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Severity;

    #[test]
    fn test_describe_filter() {
        assert_eq!(describe_filter(&RouteConfig::to_sink("c")), "all records");

        let route = RouteConfig {
            min_severity: Some(Severity::Warn),
            logger_prefix: Some("app".to_string()),
            ..RouteConfig::to_sink("c")
        };
        assert_eq!(describe_filter(&route), ">= WARN, logger app");

        let route = RouteConfig {
            min_severity: Some(Severity::Debug),
            max_severity: Some(Severity::Info),
            ..RouteConfig::to_sink("c")
        };
        assert_eq!(describe_filter(&route), "DEBUG..=INFO");
    }

    #[test]
    fn test_build_config_info_hides_params_by_default() {
        let mut sink = contracts::SinkConfig::console("console");
        sink.params.insert("target".to_string(), "stderr".to_string());
        let blueprint = PipelineBlueprint {
            sinks: vec![sink],
            routes: vec![RouteConfig::to_sink("console")],
            ..Default::default()
        };

        let mut args = InfoArgs {
            config: "routes.toml".into(),
            json: true,
            params: false,
        };
        let info = build_config_info(&blueprint, &args);
        assert!(info.sinks[0].params.is_empty());
        assert_eq!(info.routes[0].filter, "all records");

        args.params = true;
        let info = build_config_info(&blueprint, &args);
        assert_eq!(info.sinks[0].params["target"], "stderr");
    }
}
