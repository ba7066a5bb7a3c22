use super::cli::LogLevel;
use thiserror::Error;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("Failed to build log filter '{filter}': {reason}")]
    FilterFailed { filter: String, reason: String },
    #[error("Failed to install tracing subscriber: {0}")]
    InstallFailed(String),
}

/// Output format of the CLI's own logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; everything else is compact.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Collects per-target filter directives and installs the global subscriber.
pub struct LoggingSystem {
    directives: Vec<String>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
        }
    }

    /// Adds a `target=level` directive after checking it parses.
    pub fn add_directive(&mut self, directive: &str) -> Result<(), LoggingError> {
        let trimmed = directive.trim();
        if !trimmed.contains('=') || trimmed.starts_with('=') {
            return Err(LoggingError::InvalidDirective {
                directive: directive.to_string(),
                reason: "expected target=level".to_string(),
            });
        }

        trimmed
            .parse::<Directive>()
            .map_err(|e| LoggingError::InvalidDirective {
                directive: directive.to_string(),
                reason: e.to_string(),
            })?;

        self.directives.push(trimmed.to_string());
        Ok(())
    }

    /// Quiets the HTTP stack, which is chatty at debug level.
    pub fn add_default_directives(&mut self) -> Result<(), LoggingError> {
        for directive in ["hyper=warn", "reqwest=warn", "h2=warn", "tower=warn"] {
            self.add_directive(directive)?;
        }
        Ok(())
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let mut filter_parts = Vec::with_capacity(self.directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        filter_parts.extend(self.directives.iter().cloned());
        filter_parts.join(",")
    }

    pub fn directive_count(&self) -> usize {
        self.directives.len()
    }

    pub fn initialize_tracing(
        &self,
        default_level: LogLevel,
        format: LogFormat,
    ) -> Result<(), LoggingError> {
        let filter = self.build_filter_string(default_level);
        let env_filter = EnvFilter::try_new(&filter).map_err(|e| LoggingError::FilterFailed {
            filter: filter.clone(),
            reason: e.to_string(),
        })?;

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        };

        result.map_err(|e| LoggingError::InstallFailed(e.to_string()))
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the CLI subscriber. `LOG_FORMAT=json` switches to JSON lines.
pub fn setup_logging(level: LogLevel) -> Result<(), LoggingError> {
    let mut logging_system = LoggingSystem::new();
    logging_system.add_default_directives()?;
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());
    logging_system.initialize_tracing(level, format)
}
