//! 配置校验模块
//!
//! 校验规则：
//! - sink 名称非空且唯一
//! - sink 参数合法 (console: target / immediate_flush)
//! - route 引用的 sink 必须存在
//! - min_severity <= max_severity

use std::collections::HashSet;

use contracts::{ConfigError, ConsoleParams, PipelineBlueprint, SinkType};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ConfigError> {
    validate_sink_names(blueprint)?;
    validate_sink_params(blueprint)?;
    validate_routes(blueprint)?;
    Ok(())
}

/// 校验 sink 名称非空且唯一
fn validate_sink_names(blueprint: &PipelineBlueprint) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ConfigError::validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ConfigError::duplicate_name(sink.name.as_str()));
        }
    }
    Ok(())
}

/// 校验 sink 类型参数
fn validate_sink_params(blueprint: &PipelineBlueprint) -> Result<(), ConfigError> {
    for sink in &blueprint.sinks {
        match sink.sink_type {
            SinkType::Console => {
                ConsoleParams::from_params(&sink.name, &sink.params)?;
            }
        }
    }
    Ok(())
}

/// 校验 route 引用与级别范围
fn validate_routes(blueprint: &PipelineBlueprint) -> Result<(), ConfigError> {
    let names: HashSet<&str> = blueprint.sinks.iter().map(|s| s.name.as_str()).collect();

    for (idx, route) in blueprint.routes.iter().enumerate() {
        if !names.contains(route.sink.as_str()) {
            return Err(ConfigError::unresolved_route(route.sink.as_str()));
        }

        if let (Some(min), Some(max)) = (route.min_severity, route.max_severity) {
            if min > max {
                return Err(ConfigError::validation(
                    format!("routes[{}]", idx),
                    format!("min_severity ({min}) must be <= max_severity ({max})"),
                ));
            }
        }

        if let Some(prefix) = &route.logger_prefix {
            if prefix.trim_end_matches([':', '.']).is_empty() {
                return Err(ConfigError::validation(
                    format!("routes[{}].logger_prefix", idx),
                    "logger_prefix needs a logger name; omit it to match every logger",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RouteConfig, Severity, SinkConfig};

    fn blueprint() -> PipelineBlueprint {
        PipelineBlueprint {
            sinks: vec![SinkConfig::console("console")],
            routes: vec![RouteConfig::to_sink("console")],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_blueprint() {
        assert!(validate(&blueprint()).is_ok());
    }

    #[test]
    fn test_empty_blueprint_is_valid() {
        assert!(validate(&PipelineBlueprint::default()).is_ok());
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = blueprint();
        bp.sinks.push(SinkConfig::console("console"));
        let err = validate(&bp).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { ref name } if name == "console"));
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = blueprint();
        bp.sinks.push(SinkConfig::console(" "));
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("sinks[1].name"));
    }

    #[test]
    fn test_unresolved_route() {
        let mut bp = blueprint();
        bp.routes.push(RouteConfig::to_sink("audit"));
        let err = validate(&bp).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedRoute { ref sink } if sink == "audit"));
    }

    #[test]
    fn test_inverted_severity_range() {
        let mut bp = blueprint();
        bp.routes[0].min_severity = Some(Severity::Error);
        bp.routes[0].max_severity = Some(Severity::Info);
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("routes[0]"));
    }

    #[test]
    fn test_bad_console_param() {
        let mut bp = blueprint();
        bp.sinks[0]
            .params
            .insert("target".to_string(), "printer".to_string());
        assert!(matches!(
            validate(&bp).unwrap_err(),
            ConfigError::Validation { .. }
        ));
    }

    #[test]
    fn test_logger_prefix_needs_a_name() {
        for prefix in ["", "::", "."] {
            let mut bp = blueprint();
            bp.routes[0].logger_prefix = Some(prefix.to_string());
            let err = validate(&bp).unwrap_err();
            assert!(err.to_string().contains("routes[0].logger_prefix"));
        }

        let mut bp = blueprint();
        bp.routes[0].logger_prefix = Some("app::".to_string());
        assert!(validate(&bp).is_ok());
    }
}
