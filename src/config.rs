//! Configuration management for Gatekeeper.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::admission::AdmissionPolicy;
use crate::error::{GatekeeperError, Result};

/// Prefix for environment variable overrides, e.g. `GATEKEEPER_ADMISSION__MAX_REQUESTS`.
const ENV_PREFIX: &str = "GATEKEEPER";

/// Legacy port variable honoured for drop-in compatibility with existing deployments.
const PORT_ENV_VAR: &str = "API_PORT";

/// Main configuration for the Gatekeeper service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission control configuration
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Service name reported by the health endpoint
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Derive the rate key from `X-Forwarded-For` instead of the peer address
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            service_name: default_service_name(),
            trust_forwarded_for: false,
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_service_name() -> String {
    "api-gateway".to_string()
}

/// Admission control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Length of the fixed counting window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests admitted per key per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Idle windows after which a key's counter is purged
    #[serde(default = "default_retention_windows")]
    pub retention_windows: u32,

    /// Interval between background sweeps in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            retention_windows: default_retention_windows(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

fn default_window_ms() -> u64 {
    15 * 60 * 1000
}

fn default_max_requests() -> u64 {
    100
}

fn default_retention_windows() -> u32 {
    3
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

impl AdmissionConfig {
    /// Build the admission policy described by this configuration.
    pub fn policy(&self) -> Result<AdmissionPolicy> {
        AdmissionPolicy::new(Duration::from_millis(self.window_ms), self.max_requests)
            .map(|policy| policy.with_retention_windows(self.retention_windows))
    }

    /// Interval between background sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON formatted log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GatekeeperConfig {
    /// Load configuration from an optional YAML file layered with
    /// `GATEKEEPER_*` environment variables, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), reading variables from `env` instead of
    /// the process environment when it is given.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let port = match &env {
            Some(vars) => vars.get(PORT_ENV_VAR).cloned(),
            None => std::env::var(PORT_ENV_VAR).ok(),
        };

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let mut config: GatekeeperConfig = settings.try_deserialize()?;
        config.apply_port_override(port.as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatekeeperConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GatekeeperError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the listen port with the value of a legacy port variable.
    pub fn apply_port_override(&mut self, port: Option<&str>) -> Result<()> {
        if let Some(raw) = port {
            let port: u16 = raw.trim().parse().map_err(|_| {
                GatekeeperError::Config(format!("{} must be a port number, got {:?}", PORT_ENV_VAR, raw))
            })?;
            self.server.http_addr.set_port(port);
        }
        Ok(())
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.admission.window_ms == 0 {
            return Err(GatekeeperError::Config(
                "admission.window_ms must be greater than 0".into(),
            ));
        }
        if self.admission.max_requests == 0 {
            return Err(GatekeeperError::Config(
                "admission.max_requests must be greater than 0".into(),
            ));
        }
        if self.admission.retention_windows == 0 {
            return Err(GatekeeperError::Config(
                "admission.retention_windows must be greater than 0".into(),
            ));
        }
        if self.admission.sweep_interval_ms == 0 {
            return Err(GatekeeperError::Config(
                "admission.sweep_interval_ms must be greater than 0".into(),
            ));
        }
        if self.server.service_name.trim().is_empty() {
            return Err(GatekeeperError::Config(
                "server.service_name cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_legacy_gateway() {
        let config = GatekeeperConfig::default();
        assert_eq!(config.server.http_addr.port(), 3000);
        assert_eq!(config.server.service_name, "api-gateway");
        assert_eq!(config.admission.window_ms, 900_000);
        assert_eq!(config.admission.max_requests, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
admission:
  max_requests: 5
  window_ms: 1000
"#;
        let config = GatekeeperConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.admission.max_requests, 5);
        assert_eq!(config.admission.window_ms, 1000);
        // Untouched sections keep their defaults
        assert_eq!(config.admission.retention_windows, 3);
        assert_eq!(config.server.http_addr.port(), 3000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let yaml = r#"
admission:
  max_requests: 0
"#;
        let err = GatekeeperConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GatekeeperError::Config(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
admission:
  window_ms: 0
"#;
        assert!(GatekeeperConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let err = GatekeeperConfig::from_yaml("server: [unterminated").unwrap_err();
        assert!(matches!(err, GatekeeperError::Config(_)));
    }

    #[test]
    fn test_port_override() {
        let mut config = GatekeeperConfig::default();
        config.apply_port_override(Some("8088")).unwrap();
        assert_eq!(config.server.http_addr.port(), 8088);

        config.apply_port_override(None).unwrap();
        assert_eq!(config.server.http_addr.port(), 8088);

        assert!(config.apply_port_override(Some("not-a-port")).is_err());
    }

    #[test]
    fn test_admission_policy_from_config() {
        let config = AdmissionConfig {
            window_ms: 2000,
            max_requests: 7,
            retention_windows: 4,
            sweep_interval_ms: 500,
        };
        let policy = config.policy().unwrap();
        assert_eq!(policy.window(), Duration::from_secs(2));
        assert_eq!(policy.max_requests(), 7);
        assert_eq!(policy.retention(), Duration::from_secs(8));
        assert_eq!(config.sweep_interval(), Duration::from_millis(500));
    }

    fn write_temp_yaml(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "gatekeeper-{}-{}.yaml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_from_file() {
        let path = write_temp_yaml(
            "file",
            "server:\n  service_name: edge\nadmission:\n  max_requests: 42\n",
        );

        let config = GatekeeperConfig::load_with_env(Some(&path), Some(HashMap::new())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.service_name, "edge");
        assert_eq!(config.admission.max_requests, 42);
    }

    #[test]
    fn test_env_overrides_file() {
        let path = write_temp_yaml(
            "env",
            "admission:\n  max_requests: 42\n  window_ms: 5000\nserver:\n  http_addr: 127.0.0.1:9000\n",
        );
        let env = HashMap::from([
            ("GATEKEEPER_ADMISSION__MAX_REQUESTS".to_string(), "7".to_string()),
            ("GATEKEEPER_LOGGING__JSON".to_string(), "true".to_string()),
            ("API_PORT".to_string(), "8089".to_string()),
            ("UNRELATED_VAR".to_string(), "ignored".to_string()),
        ]);

        let config = GatekeeperConfig::load_with_env(Some(&path), Some(env)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.admission.max_requests, 7);
        // Values only present in the file survive
        assert_eq!(config.admission.window_ms, 5000);
        assert!(config.logging.json);
        assert_eq!(config.server.http_addr, "127.0.0.1:8089".parse().unwrap());
    }

    #[test]
    fn test_env_without_file_uses_defaults() {
        let env = HashMap::from([("API_PORT".to_string(), "4000".to_string())]);

        let config = GatekeeperConfig::load_with_env(None, Some(env)).unwrap();
        assert_eq!(config.server.http_addr.port(), 4000);
        assert_eq!(config.admission.max_requests, 100);
    }

    #[test]
    fn test_invalid_env_values_rejected() {
        let env = HashMap::from([("API_PORT".to_string(), "99999".to_string())]);
        assert!(GatekeeperConfig::load_with_env(None, Some(env)).is_err());

        let env = HashMap::from([(
            "GATEKEEPER_ADMISSION__MAX_REQUESTS".to_string(),
            "0".to_string(),
        )]);
        let err = GatekeeperConfig::load_with_env(None, Some(env)).unwrap_err();
        assert!(matches!(err, GatekeeperError::Config(_)));
    }
}
