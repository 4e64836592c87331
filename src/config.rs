use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub buildlogger: BuildloggerConfig,
    pub store: StoreConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildloggerConfig {
    /// Base location of pagination links
    pub base_url: String,
}

impl Default for BuildloggerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file the in-memory store is seeded from
    pub seed_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/metrics".to_string(),
        }
    }
}

/// Load configuration from `path` (optional) overlaid with `BUILDLOGGER__*`
/// environment variables.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("BUILDLOGGER").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        anyhow::bail!("Server port must be non-zero");
    }

    if cfg.server.request_timeout_seconds == 0 {
        anyhow::bail!("Request timeout must be at least one second");
    }

    match cfg.server.log_format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("Invalid log format '{}', expected 'text' or 'json'", other),
    }

    let base_url = url::Url::parse(&cfg.buildlogger.base_url).map_err(|e| {
        anyhow::anyhow!("Invalid buildlogger base_url '{}': {}", cfg.buildlogger.base_url, e)
    })?;
    if !matches!(base_url.scheme(), "http" | "https") {
        anyhow::bail!(
            "Buildlogger base_url '{}' must use http or https",
            cfg.buildlogger.base_url
        );
    }

    if cfg.metrics.enabled && !cfg.metrics.endpoint.starts_with('/') {
        anyhow::bail!("Metrics endpoint '{}' must start with '/'", cfg.metrics.endpoint);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_config_rejects_bad_base_url() {
        let mut cfg = Config::default();
        cfg.buildlogger.base_url = "not a url".to_string();
        let result = validate_config(&cfg);
        assert!(result.unwrap_err().to_string().contains("Invalid buildlogger base_url"));

        cfg.buildlogger.base_url = "ftp://logs.example.com".to_string();
        let result = validate_config(&cfg);
        assert!(result.unwrap_err().to_string().contains("must use http or https"));
    }

    #[test]
    fn test_validate_config_rejects_log_format() {
        let mut cfg = Config::default();
        cfg.server.log_format = "yaml".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_config_rejects_zero_timeout() {
        let mut cfg = Config::default();
        cfg.server.request_timeout_seconds = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9090
log_format = "json"

[buildlogger]
base_url = "https://logs.example.com"

[store]
seed_file = "logs.json"
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.log_format, "json");
        assert_eq!(cfg.buildlogger.base_url, "https://logs.example.com");
        assert_eq!(cfg.store.seed_file.as_deref(), Some("logs.json"));
        assert!(cfg.metrics.enabled);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.server.port, 8080);
    }
}
