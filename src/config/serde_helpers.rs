use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Durations travel as integer milliseconds in config files.
pub mod duration_ms {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper function to load and parse a variable through `lookup`.
/// Returns Ok(()) if the variable doesn't exist (keeps default).
pub fn load_var<T, F>(lookup: &F, name: &str, target: &mut T) -> Result<(), super::ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(name) {
        *target = value
            .trim()
            .parse()
            .map_err(|e| super::ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

/// Like [`load_var`] for millisecond durations.
pub fn load_duration_ms<F>(
    lookup: &F,
    name: &str,
    target: &mut Duration,
) -> Result<(), super::ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut millis = target.as_millis() as u64;
    load_var(lookup, name, &mut millis)?;
    *target = Duration::from_millis(millis);
    Ok(())
}

/// Helper function to load a string variable.
pub fn load_string<F>(lookup: &F, name: &str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(name) {
        *target = value;
    }
}

/// Accepts the usual spellings of a boolean flag.
pub fn load_bool<F>(lookup: &F, name: &str, target: &mut bool) -> Result<(), super::ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(name) {
        *target = match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            other => {
                return Err(super::ConfigError::EnvError(format!(
                    "Invalid {name}: expected a boolean, got '{other}'"
                )));
            }
        };
    }
    Ok(())
}
