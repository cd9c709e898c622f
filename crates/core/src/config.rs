use anyhow::{ensure, Context, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub deployment_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Emit full request/response bodies at debug level. Prompts may carry personal data.
    #[serde(default)]
    pub log_payloads: bool,
}

impl OpenAiConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: None,
            deployment_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_payloads: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rejects blank credentials so a half-configured client never gets built.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.base_url.trim().is_empty() && !self.api_key.trim().is_empty(),
            "OpenAI configuration is blank: set OPENAI_BASE_URL and OPENAI_API_KEY in .env"
        );
        ensure!(self.timeout_secs > 0, "OPENAI_TIMEOUT_SECS must be greater than zero");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub openai: Option<OpenAiConfig>,
}

impl AppConfig {
    /// Build configuration from well-known environment variables.
    pub fn load_from_env() -> Result<Self> {
        preload_env_files();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        if config.openai.is_none() {
            tracing::debug!("OPENAI_BASE_URL / OPENAI_API_KEY not set; OpenAI client disabled");
        }
        Ok(config)
    }

    /// Same as [`AppConfig::load_from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let openai = match (non_empty("OPENAI_BASE_URL"), non_empty("OPENAI_API_KEY")) {
            (Some(base_url), Some(api_key)) => {
                let timeout_secs = match non_empty("OPENAI_TIMEOUT_SECS") {
                    Some(raw) => raw
                        .trim()
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .with_context(|| {
                            format!("OPENAI_TIMEOUT_SECS must be a positive integer, got {raw:?}")
                        })?,
                    None => default_timeout_secs(),
                };

                let log_payloads = match non_empty("OPENAI_LOG_PAYLOADS") {
                    Some(raw) => parse_flag(&raw).with_context(|| {
                        format!("OPENAI_LOG_PAYLOADS must be a boolean, got {raw:?}")
                    })?,
                    None => false,
                };

                Some(OpenAiConfig {
                    base_url: base_url.trim().to_string(),
                    api_key: api_key.trim().to_string(),
                    model: non_empty("OPENAI_MODEL"),
                    deployment_id: non_empty("OPENAI_DEPLOYMENT_ID"),
                    timeout_secs,
                    log_payloads,
                })
            }
            _ => None,
        };

        Ok(Self { openai })
    }

    /// Helper that forces the presence of OpenAI configuration.
    pub fn require_openai_config(&self) -> Result<&OpenAiConfig> {
        let config = self.openai.as_ref().context(
            "OpenAI configuration not found: create a .env in the current directory and set OPENAI_BASE_URL and OPENAI_API_KEY",
        )?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn preload_env_files() {
    // Pick up .env from the working directory first, then the workspace root.
    let _ = dotenv();

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_env = manifest_dir.join("../../.env");
    if workspace_env.exists() {
        let _ = dotenvy::from_path(workspace_env);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn openai_section_requires_both_url_and_key() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_BASE_URL", "https://api.openai.com")]))
            .unwrap();
        assert!(config.openai.is_none());
        assert!(config.require_openai_config().is_err());

        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_BASE_URL", "https://api.openai.com"),
            ("OPENAI_API_KEY", "   "),
        ]))
        .unwrap();
        assert!(config.openai.is_none());
    }

    #[test]
    fn reads_optional_settings() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_BASE_URL", "https://contoso.openai.azure.com"),
            ("OPENAI_API_KEY", "secret"),
            ("OPENAI_DEPLOYMENT_ID", "gpt4dep"),
            ("OPENAI_TIMEOUT_SECS", "15"),
            ("OPENAI_LOG_PAYLOADS", "yes"),
        ]))
        .unwrap();

        let openai = config.require_openai_config().unwrap();
        assert_eq!(openai.deployment_id.as_deref(), Some("gpt4dep"));
        assert_eq!(openai.model, None);
        assert_eq!(openai.timeout(), Duration::from_secs(15));
        assert!(openai.log_payloads);
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_BASE_URL", "https://api.openai.com"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();

        let openai = config.openai.unwrap();
        assert_eq!(openai.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(!openai.log_payloads);
    }

    #[test]
    fn rejects_bad_timeout_and_flag() {
        let bad_timeout = AppConfig::from_lookup(lookup(&[
            ("OPENAI_BASE_URL", "https://api.openai.com"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_TIMEOUT_SECS", "0"),
        ]));
        assert!(bad_timeout.is_err());

        let bad_flag = AppConfig::from_lookup(lookup(&[
            ("OPENAI_BASE_URL", "https://api.openai.com"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_LOG_PAYLOADS", "maybe"),
        ]));
        assert!(bad_flag.is_err());
    }

    #[test]
    fn validate_catches_blank_manual_config() {
        assert!(OpenAiConfig::new("", "key").validate().is_err());
        assert!(OpenAiConfig::new("https://api.openai.com", "key").validate().is_ok());
    }
}
