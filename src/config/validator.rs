use thiserror::Error;

use crate::config::{BackendSettings, SchemaSettings, Settings, MAX_CACHE_TTL_SECONDS};

#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_server(&settings.server) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_backend(&settings.backend) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_schema(&settings.schema) {
            errors.extend(e);
        }

        if settings.output.export_basename.trim().is_empty() {
            errors.push(ConfigValidationError::MissingField(
                "output.export_basename".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(
        server: &crate::config::ServerSettings,
    ) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if server.host.is_empty() {
            errors.push(ConfigValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_backend(backend: &BackendSettings) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if !(backend.base_url.starts_with("http://") || backend.base_url.starts_with("https://")) {
            errors.push(ConfigValidationError::InvalidValue {
                field: "backend.base_url".to_string(),
                reason: format!("'{}' is not an http(s) URL", backend.base_url),
            });
        }

        if backend.timeout_seconds == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: "backend.timeout_seconds".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }

        for (field, template) in [
            ("backend.schema_path", &backend.schema_path),
            ("backend.execute_path", &backend.execute_path),
        ] {
            if !template.contains("{name}") {
                errors.push(ConfigValidationError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("'{}' must contain the {{name}} placeholder", template),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_schema(schema: &SchemaSettings) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if schema.cache_ttl_seconds == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: "schema.cache_ttl_seconds".to_string(),
                reason: "TTL must be greater than 0".to_string(),
            });
        } else if schema.cache_ttl_seconds > MAX_CACHE_TTL_SECONDS {
            errors.push(ConfigValidationError::InvalidValue {
                field: "schema.cache_ttl_seconds".to_string(),
                reason: format!("TTL must be at most {} seconds", MAX_CACHE_TTL_SECONDS),
            });
        }

        for (name, root) in &schema.root_overrides {
            if root.trim().is_empty() {
                errors.push(ConfigValidationError::MissingField(format!(
                    "schema.root_overrides.{}",
                    name
                )));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerSettings;

    #[test]
    fn test_valid_config() {
        let settings = Settings::default();
        assert!(ConfigValidator::validate(&settings).is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let settings = Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            ..Default::default()
        };

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_reports_every_problem() {
        let mut settings = Settings::default();
        settings.server.host = String::new();
        settings.backend.base_url = "ftp://files".to_string();
        settings.backend.schema_path = "/schema".to_string();
        settings.schema.cache_ttl_seconds = 0;

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidValue { field, .. } if field == "backend.schema_path")));
    }

    #[test]
    fn test_cache_ttl_upper_bound() {
        let mut settings = Settings::default();
        settings.schema.cache_ttl_seconds = MAX_CACHE_TTL_SECONDS;
        assert!(ConfigValidator::validate(&settings).is_ok());

        settings.schema.cache_ttl_seconds = u64::MAX;
        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("at most"));
    }
}
