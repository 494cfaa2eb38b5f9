//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! fall back to defaults section by section.

use serde::{Deserialize, Serialize};

use crate::dispatch::encoding::CompressionLevel;

/// Root configuration for the dispatch engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Dispatch behaviour.
    pub dispatch: DispatchConfig,

    /// Response content encoding.
    pub encoding: EncodingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration. When present the encrypted transport is used.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// How faults inside the pipeline are contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    /// Run the pipeline on its own task.
    #[default]
    Isolated,
    /// Run the pipeline inline, catching errors and panics around it.
    Direct,
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Fault isolation mode.
    pub isolation: Isolation,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            isolation: Isolation::Isolated,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Content encoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Codecs to register, in order. `*` in Accept-Encoding selects the first.
    pub codecs: Vec<String>,

    /// Compression level for the built-in codecs.
    pub level: CompressionLevel,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codecs: vec!["gzip".to_string(), "deflate".to_string(), "br".to_string()],
            level: CompressionLevel::Default,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Attach an application logger. Without one, faults go to stderr.
    pub app_logger: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            app_logger: true,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [dispatch]
            isolation = "direct"

            [encoding]
            codecs = ["br"]
            level = "best"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.listener.max_connections, 10_000);
        assert_eq!(config.dispatch.isolation, Isolation::Direct);
        assert_eq!(config.encoding.codecs, vec!["br"]);
        assert_eq!(config.encoding.level, CompressionLevel::Best);
        assert!(config.observability.app_logger);
    }
}
