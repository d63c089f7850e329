// src/config.rs
use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::normalize::NormalizeConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/calendar.toml";

fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}
fn default_countries() -> Vec<String> {
    vec!["美国".to_string(), "中国".to_string()]
}
fn default_importance() -> i64 {
    3
}
fn default_output_dir() -> String {
    "calendar_files".to_string()
}
fn default_feed_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reference timezone all instants are normalized into.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Country allow-set for the macro-data feed.
    #[serde(default = "default_countries")]
    pub countries: Vec<String>,
    /// Required importance level for the macro-data feed.
    #[serde(default = "default_importance")]
    pub importance: i64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    #[serde(default)]
    pub enrich: EnrichConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            countries: default_countries(),
            importance: default_importance(),
            output_dir: default_output_dir(),
            feed_timeout_secs: default_feed_timeout(),
            enrich: EnrichConfig::default(),
        }
    }
}

fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_search_timeout() -> u64 {
    10
}
fn default_analysis_timeout() -> u64 {
    30
}
fn default_concurrency() -> usize {
    4
}
fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// "ENV" means: read from OPENAI_API_KEY. A missing credential doesn't
    /// fail the run; enrichment degrades instead.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            api_key: default_api_key(),
            model: default_model(),
            search_timeout_secs: default_search_timeout(),
            analysis_timeout_secs: default_analysis_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

impl SyncConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading config from {}", path.as_ref().display()))?;
        let mut cfg: SyncConfig = toml::from_str(&data).context("parsing config")?;
        cfg.resolve_credential();
        Ok(cfg)
    }

    /// Explicit path must exist; otherwise use `config/calendar.toml` when
    /// present, else built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load_from_file(p);
        }
        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from_file(fallback);
        }
        let mut cfg = Self::default();
        cfg.resolve_credential();
        Ok(cfg)
    }

    fn resolve_credential(&mut self) {
        if self.enrich.api_key.trim().eq_ignore_ascii_case("env") {
            self.enrich.api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
            if self.enrich.enabled && self.enrich.api_key.is_empty() {
                warn!("OPENAI_API_KEY not set; analysis will be unavailable");
            }
        }
    }

    pub fn reference_tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid timezone {:?}: {e}", self.timezone))
    }

    pub fn normalize_config(&self) -> Result<NormalizeConfig> {
        Ok(NormalizeConfig {
            tz: self.reference_tz()?,
            countries: self.countries.clone(),
            importance: self.importance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_gets_defaults() {
        let cfg: SyncConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.timezone, "Asia/Shanghai");
        assert_eq!(cfg.countries, vec!["美国", "中国"]);
        assert_eq!(cfg.importance, 3);
        assert!(cfg.enrich.enabled);
        assert_eq!(cfg.enrich.model, "gpt-4o-mini");
    }

    #[test]
    fn overrides_are_honored() {
        let cfg: SyncConfig = toml::from_str(
            r#"
timezone = "Asia/Shanghai"
countries = ["美国"]
importance = 2

[enrich]
enabled = false
concurrency = 8
"#,
        )
        .unwrap();
        assert_eq!(cfg.countries, vec!["美国"]);
        assert_eq!(cfg.importance, 2);
        assert!(!cfg.enrich.enabled);
        assert_eq!(cfg.enrich.concurrency, 8);
    }

    #[test]
    fn bad_timezone_is_an_error() {
        let cfg = SyncConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(cfg.reference_tz().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_indirection_resolves_credential() {
        env::set_var("OPENAI_API_KEY", "sk-test");
        let mut cfg = SyncConfig::default();
        cfg.resolve_credential();
        assert_eq!(cfg.enrich.api_key, "sk-test");

        env::remove_var("OPENAI_API_KEY");
        let mut cfg = SyncConfig::default();
        cfg.resolve_credential();
        assert!(cfg.enrich.api_key.is_empty());
    }
}
