use bigdecimal::BigDecimal;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::service::classifier::{Classifier, DEFAULT_RETENTION_CODES};
use crate::service::reconciliation::{Reconciler, DEFAULT_TOLERANCE};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub extractor: ExtractorConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Everything the AI extraction client needs, handed over at construction.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 120,
            max_attempts: 4,
            initial_backoff_ms: 1000,
        }
    }
}

// keeps the key out of startup logs
impl std::fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .finish()
    }
}

/// Reconciliation tolerance and retention codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub tolerance: String,
    pub retention_codes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE.to_string(),
            retention_codes: DEFAULT_RETENTION_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl PolicyConfig {
    pub fn classifier(&self) -> Classifier {
        Classifier::new(&self.retention_codes)
    }

    pub fn reconciler(&self) -> Result<Reconciler, ConfigError> {
        let tolerance = BigDecimal::from_str(self.tolerance.trim()).map_err(|e| {
            ConfigError::Message(format!("policy.tolerance '{}': {}", self.tolerance, e))
        })?;
        Ok(Reconciler::new(tolerance))
    }
}

impl AppConfig {
    /// Defaults, then an optional `darf.toml`, then `DARF__*` environment variables.
    ///
    /// `GEMINI_API_KEY` (or `API_KEY`) fills the extractor key when it was not
    /// set any other way. `DARF__POLICY__RETENTION_CODES` takes a comma list.
    pub fn load() -> Result<Self, ConfigError> {
        let fallback_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok();

        let mut config: AppConfig = Config::builder()
            .add_source(File::with_name("darf").required(false))
            .add_source(
                Environment::with_prefix("DARF")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("policy.retention_codes")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if config.extractor.api_key.is_none() {
            config.extractor.api_key = fallback_key;
        }
        config.policy.reconciler()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.policy.retention_codes, vec!["5952", "0561", "1062"]);
        assert_eq!(
            config.policy.reconciler().unwrap().tolerance(),
            &BigDecimal::from_str("0.05").unwrap()
        );
    }

    #[test]
    fn bad_tolerance_is_a_config_error() {
        let policy = PolicyConfig {
            tolerance: "five cents".to_string(),
            ..PolicyConfig::default()
        };
        assert!(policy.reconciler().is_err());
    }

    #[test]
    fn debug_hides_api_key() {
        let config = ExtractorConfig {
            api_key: Some("secret-123".to_string()),
            ..ExtractorConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-123"));
        assert!(printed.contains("***"));
    }
}
