use super::{ConfigError, LoggerConfig};
use std::time::Duration;
use url::Url;

impl LoggerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::MissingField("agent_id"));
        }

        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField("api_key"));
        }

        // Validate endpoint URL
        let url = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {}", self.endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "Endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max retries must be greater than 0".to_string(),
            ));
        }

        if self.buffer_capacity < self.batch_size {
            return Err(ConfigError::InvalidConfig(format!(
                "Buffer capacity ({}) must be at least as large as batch size ({})",
                self.buffer_capacity, self.batch_size
            )));
        }

        for (name, value) in [
            ("Flush interval", self.flush_interval),
            ("Request timeout", self.request_timeout),
            ("Close timeout", self.close_timeout),
        ] {
            if value == Duration::ZERO {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.circuit_failure_threshold == 0 {
            return Err(ConfigError::InvalidConfig(
                "Circuit failure threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
