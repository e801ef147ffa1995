//! SinkFactory - explicit construction of sinks from configuration

use contracts::{ConfigError, ConsoleParams, Sink, SinkConfig, SinkType};
use tracing::instrument;

use crate::sinks::ConsoleSink;

/// Creates a sink instance from its declaration
pub trait SinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn Sink>, ConfigError>;
}

impl<F> SinkFactory for F
where
    F: Fn(&SinkConfig) -> Result<Box<dyn Sink>, ConfigError>,
{
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn Sink>, ConfigError> {
        self(config)
    }
}

/// Factory for the built-in sink types
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSinkFactory;

impl SinkFactory for DefaultSinkFactory {
    #[instrument(
        name = "sink_factory_create",
        skip(self, config),
        fields(sink = %config.name, sink_type = ?config.sink_type)
    )]
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn Sink>, ConfigError> {
        match config.sink_type {
            SinkType::Console => {
                let params = ConsoleParams::from_params(&config.name, &config.params)?;
                Ok(Box::new(ConsoleSink::from_params(
                    config.name.clone(),
                    params,
                )))
            }
        }
    }
}
