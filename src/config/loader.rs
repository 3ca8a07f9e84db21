//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file without semantic validation.
///
/// Validation runs once command-line overrides have been applied.
pub fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse TOML text into a config. Missing sections take their defaults.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [search]
            max_concurrent_requests = 4
            max_queue_duration_ms = 2500

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.search.max_concurrent_requests, Some(4));
        assert_eq!(config.search.max_queue_duration_ms, 2500);
        assert_eq!(config.search.max_query_duration_ms, 30_000);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse_config("").unwrap(), AppConfig::default());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            parse_config("[search\nmax_concurrent_requests = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reads_file_without_validating() {
        let path = std::env::temp_dir().join(format!("query-gate-read-{}.toml", std::process::id()));
        fs::write(&path, "[search]\nmax_query_duration_ms = 0\n").unwrap();

        let config = read_config(&path);
        let _ = fs::remove_file(&path);

        assert_eq!(config.unwrap().search.max_query_duration_ms, 0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config(Path::new("/nonexistent/query-gate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
