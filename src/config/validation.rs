//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (connections > 0, body limit > 0)
//! - Check referenced codecs and addresses exist / parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    MaxConnections,

    #[error("listener.tls.{field} must not be empty")]
    TlsPath { field: &'static str },

    #[error("dispatch.max_body_bytes must be greater than zero")]
    BodyLimit,

    #[error("encoding.codecs contains unknown codec '{0}'")]
    UnknownCodec(String),

    #[error("encoding.codecs lists '{0}' more than once")]
    DuplicateCodec(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

const KNOWN_CODECS: [&str; 3] = ["gzip", "deflate", "br"];

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::MaxConnections);
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::TlsPath { field: "cert_path" });
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::TlsPath { field: "key_path" });
        }
    }

    if config.dispatch.max_body_bytes == 0 {
        errors.push(ValidationError::BodyLimit);
    }

    let mut seen = HashSet::new();
    for codec in &config.encoding.codecs {
        if !KNOWN_CODECS.contains(&codec.as_str()) {
            errors.push(ValidationError::UnknownCodec(codec.clone()));
        } else if !seen.insert(codec.as_str()) {
            errors.push(ValidationError::DuplicateCodec(codec.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
