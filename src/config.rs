use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// CLI host configuration, loaded from a YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the HR backend, e.g. `http://localhost:8000/api/v1`
    pub api_base_url: String,
    /// Resource segment of the record endpoints
    #[serde(default = "default_resource")]
    pub resource: String,
    /// Per-request timeout for gateway calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_resource() -> String {
    "employees".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        AppConfig {
            api_base_url: api_base_url.into(),
            resource: default_resource(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_deserialization_with_defaults() {
        let yaml = r#"
api_base_url: "http://localhost:8000/api/v1"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.resource, "employees");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_explicit_values_win_over_defaults() {
        let yaml = r#"
api_base_url: "https://hr.example.com/api"
resource: "staff"
request_timeout_secs: 5
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.resource, "staff");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_base_url: \"http://localhost:9999\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9999");
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = AppConfig::with_base_url("http://localhost:8000");
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("api_base_url"));

        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.api_base_url, config.api_base_url);
    }
}
