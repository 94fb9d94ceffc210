//! Configuration validation.
//!
//! Catches settings that would otherwise fail later at runtime, such as
//! elite mode without credentials or a zero-sized concurrency limit.

use thiserror::Error;

use crate::config::{Config, EliteConfig, ObservabilityConfig, RefreshConfig, ServerConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.server.validate() {
            errors.push(e);
        }
        if let Err(e) = self.elite.validate() {
            errors.push(e);
        }
        if let Err(e) = self.refresh.validate() {
            errors.push(e);
        }
        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }
        if let Err(e) = url_check("upstream.public_base", &self.upstream.public_base) {
            errors.push(e);
        }
        if let Err(e) = url_check("upstream.elite_base", &self.upstream.elite_base) {
            errors.push(e);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.throttle == 0 {
            return Err(invalid("server.throttle", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("server.timeout_secs", "must be greater than 0"));
        }
        if self.cache_ttl_secs == 0 {
            return Err(invalid("server.cache_ttl_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Validate for EliteConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.enabled && self.credentials().is_none() {
            return Err(ValidationError::MissingField {
                field: "elite.email / elite.password".into(),
            });
        }
        Ok(())
    }
}

impl Validate for RefreshConfig {
    fn validate(&self) -> ValidationResult<()> {
        let intervals = [
            ("refresh.vocabulary_interval_secs", self.vocabulary_interval_secs),
            ("refresh.futures_interval_secs", self.futures_interval_secs),
            ("refresh.news_interval_secs", self.news_interval_secs),
            ("refresh.login_interval_secs", self.login_interval_secs),
        ];
        for (field, secs) in intervals {
            if secs == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        const FORMATS: &[&str] = &["json", "pretty"];

        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(invalid(
                "observability.log_level",
                &format!("'{}' is not one of {:?}", self.log_level, LEVELS),
            ));
        }
        if !FORMATS.contains(&self.log_format.as_str()) {
            return Err(invalid(
                "observability.log_format",
                &format!("'{}' is not one of {:?}", self.log_format, FORMATS),
            ));
        }
        Ok(())
    }
}

fn url_check(field: &str, value: &str) -> ValidationResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(invalid(field, "must be an http(s) URL"))
    }
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_elite_requires_credentials() {
        let mut config = Config::default();
        config.elite.enabled = true;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingField { .. })
        ));

        config.elite.email = Some("me@example.com".into());
        config.elite.password = Some("secret".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_throttle_rejected() {
        let mut config = Config::default();
        config.server.throttle = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiple_errors_collected() {
        let mut config = Config::default();
        config.server.cache_ttl_secs = 0;
        config.observability.log_format = "xml".into();
        config.upstream.public_base = "finviz.com".into();

        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {:?}", other),
        }
    }
}
