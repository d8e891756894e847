use std::{collections::HashMap, net::SocketAddr, str::FromStr};

use http::Method;

use crate::{
    config::models::{RouteConfig, ServerConfig},
    core::route::RoutePattern,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Route conflict detected: {message}")]
    RouteConflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration, collecting every problem
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_timeout(&config.upstream_timeout) {
            errors.push(e);
        }

        if config.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "max_body_bytes".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if !config.status_path.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: "status_path".to_string(),
                message: "Status path must start with '/'".to_string(),
            });
        }

        for method in &config.allowed_methods {
            if Method::from_str(method).is_err() {
                errors.push(ValidationError::InvalidField {
                    field: "allowed_methods".to_string(),
                    message: format!("'{method}' is not a valid HTTP method"),
                });
            }
        }

        if config.routes.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "routes".to_string(),
            });
        } else {
            for route in &config.routes {
                errors.extend(Self::validate_single_route(route));
            }
        }

        errors.extend(Self::check_route_conflicts(&config.routes));

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(&errors),
            }),
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_timeout(timeout: &str) -> ValidationResult<()> {
        match humantime::parse_duration(timeout) {
            Ok(d) if d.is_zero() => Err(ValidationError::InvalidField {
                field: "upstream_timeout".to_string(),
                message: "Must be greater than 0".to_string(),
            }),
            Ok(_) => Ok(()),
            Err(e) => Err(ValidationError::InvalidField {
                field: "upstream_timeout".to_string(),
                message: format!("'{timeout}' is not a duration like '500ms' or '30s': {e}"),
            }),
        }
    }

    /// Validate a single route configuration
    fn validate_single_route(route: &RouteConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let pattern = &route.pattern;

        if let Err(e) = RoutePattern::parse(pattern) {
            errors.push(ValidationError::InvalidField {
                field: format!("route pattern: {pattern}"),
                message: e.to_string(),
            });
        }

        if let Err(e) = Self::validate_url(&route.target, &format!("route '{pattern}' target")) {
            errors.push(e);
        }

        if let Some(rewrite) = &route.rewrite {
            if !rewrite.starts_with('/') {
                errors.push(ValidationError::InvalidField {
                    field: format!("route '{pattern}' rewrite"),
                    message: "Rewrite must start with '/'".to_string(),
                });
            }
        }

        errors
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    /// Patterns that normalise to the same key would be rejected at registration
    fn check_route_conflicts(routes: &[RouteConfig]) -> Vec<ValidationError> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        let mut errors = Vec::new();

        for route in routes {
            let Ok(pattern) = RoutePattern::parse(&route.pattern) else {
                continue;
            };
            if let Some(first) = seen.get(pattern.key()) {
                errors.push(ValidationError::RouteConflict {
                    message: format!(
                        "pattern '{}' duplicates earlier pattern '{first}'",
                        route.pattern
                    ),
                });
            } else {
                seen.insert(pattern.key().to_string(), &route.pattern);
            }
        }
        errors
    }

    fn format_multiple_errors(errors: &[ValidationError]) -> String {
        let mut message = format!("Found {} configuration errors:", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("\n  {}. {error}", i + 1));
        }
        message
    }
}
