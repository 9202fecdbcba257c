mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use defaults::*;
use std::path::Path;
use std::time::Duration;

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            context: None,
            session_dir: default_session_dir(),
            report_dir: default_report_dir(),
            write_reports: default_true(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            retry: RetryConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("limits.max_ideas", self.limits.max_ideas as u64),
            (
                "limits.max_concurrent_lookups",
                self.limits.max_concurrent_lookups as u64,
            ),
            ("timeouts.ideas_sec", self.timeouts.ideas_sec),
            ("timeouts.lookup_sec", self.timeouts.lookup_sec),
            ("timeouts.search_sec", self.timeouts.search_sec),
            ("timeouts.report_sec", self.timeouts.report_sec),
            ("timeouts.chat_sec", self.timeouts.chat_sec),
            ("retry.max_attempts", self.retry.max_attempts as u64),
            ("retry.backoff_base_ms", self.retry.backoff_base_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if let Some(context) = &self.context {
            context.validate()?;
        }

        Ok(())
    }
}

impl TimeoutsConfig {
    pub fn ideas(&self) -> Duration {
        Duration::from_secs(self.ideas_sec)
    }

    pub fn lookup(&self) -> Duration {
        Duration::from_secs(self.lookup_sec)
    }

    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_sec)
    }

    pub fn report(&self) -> Duration {
        Duration::from_secs(self.report_sec)
    }

    pub fn chat(&self) -> Duration {
        Duration::from_secs(self.chat_sec)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_ideas, 5);
        assert!(config.providers.guardrail.is_none());
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
context:
  company: Acme
  role: Analyst
  interests: [AI]
limits:
  max_ideas: 3
providers:
  lookup:
    binary: ./agents/lookup.sh
    timeout_sec: 30
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_ideas, 3);
        assert_eq!(config.limits.max_concurrent_lookups, 5);
        assert_eq!(
            config.providers.lookup.binary,
            std::path::PathBuf::from("./agents/lookup.sh")
        );
        assert!(config.providers.lookup.args.is_empty());
        assert_eq!(config.providers.ideas.args, vec!["ideas".to_string()]);
        assert_eq!(config.timeouts.lookup(), Duration::from_secs(180));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let yaml = "limits:\n  max_concurrent_lookups: 0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_lookups"));
    }

    #[test]
    fn test_invalid_default_context_rejected() {
        let yaml = "context:\n  company: Acme\n  role: Analyst\n  interests: []\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Context(_))));
    }
}
