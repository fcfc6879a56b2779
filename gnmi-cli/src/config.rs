//! CLI configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gnmi_client::TlsOptions;

/// Top-level configuration for the CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default target, used when --target is not given
    #[serde(default)]
    pub target: Option<TargetConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A gNMI target device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// gRPC endpoint (e.g., "192.168.1.1:9339")
    pub address: String,

    /// Authentication credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// TLS configuration
    #[serde(default)]
    pub tls: TlsConfig,
}

/// Authentication credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,
}

/// TLS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Enable TLS
    #[serde(default)]
    pub enabled: bool,

    /// Expected server name, when it differs from the address
    #[serde(default)]
    pub domain_name: Option<String>,

    /// Path to CA certificate file
    #[serde(default)]
    pub ca_cert: Option<String>,

    /// Path to client certificate file
    #[serde(default)]
    pub client_cert: Option<String>,

    /// Path to client key file
    #[serde(default)]
    pub client_key: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,

    /// Structured JSON for log aggregation systems
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CliConfig {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        Ok(config)
    }
}

impl TlsConfig {
    /// Convert to client TLS options, or None when TLS is disabled
    pub fn to_options(&self) -> Option<TlsOptions> {
        if !self.enabled {
            return None;
        }

        Some(TlsOptions {
            domain_name: self.domain_name.clone(),
            ca_cert: self.ca_cert.as_ref().map(PathBuf::from),
            client_cert: self.client_cert.as_ref().map(PathBuf::from),
            client_key: self.client_key.as_ref().map(PathBuf::from),
        })
    }
}

/// Initialize tracing with the given configuration.
///
/// Log events go to stderr so that command output on stdout stays clean.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
