use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("temperature must be within 0.0..=2.0, got {0}")]
    Temperature(f32),
    #[error("top_p must be within (0.0, 1.0], got {0}")]
    TopP(f32),
    #[error("max_output_tokens must be greater than 0")]
    MaxOutputTokens,
    #[error("retry.max_attempts must be at least 1")]
    MaxAttempts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCfg {
    pub kind: String, // "gemini" | "mock"
    pub model: String,
    pub api_key_env: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub rate_per_min: u32,
    pub seed: u64,
}

impl Default for ProviderCfg {
    fn default() -> Self {
        Self {
            kind: "gemini".into(),
            model: "gemini-1.5-flash".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            endpoint: GEMINI_BASE_URL.into(),
            timeout_secs: 30,
            rate_per_min: 60,
            seed: 42,
        }
    }
}

/// Sampling parameters as written in the config file. Turned into a
/// [`GenerationConfig`] by [`GenerationCfg::validate`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationCfg {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
}

impl Default for GenerationCfg {
    fn default() -> Self {
        Self { temperature: 0.7, max_output_tokens: 60, top_p: 0.9 }
    }
}

impl GenerationCfg {
    /// Sampling for thought-of-the-day and spiritual content, which need
    /// longer and slightly more focused output than a reflection.
    pub fn content_defaults() -> Self {
        Self { temperature: 0.5, max_output_tokens: 1024, top_p: 0.95 }
    }

    pub fn validate(&self) -> Result<GenerationConfig, ConfigError> {
        GenerationConfig::new(self.temperature, self.max_output_tokens, self.top_p)
    }
}

/// Validated sampling parameters handed to a text generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
}

impl GenerationConfig {
    pub fn new(temperature: f32, max_output_tokens: u32, top_p: f32) -> Result<Self, ConfigError> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Temperature(temperature));
        }
        if !(top_p > 0.0 && top_p <= 1.0) {
            return Err(ConfigError::TopP(top_p));
        }
        if max_output_tokens == 0 {
            return Err(ConfigError::MaxOutputTokens);
        }
        Ok(Self { temperature, max_output_tokens, top_p })
    }

    pub fn temperature(&self) -> f32 { self.temperature }
    pub fn max_output_tokens(&self) -> u32 { self.max_output_tokens }
    pub fn top_p(&self) -> f32 { self.top_p }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryCfg {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_factor: f64,
    pub backoff_jitter_ms: u64,
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self { max_attempts: 2, backoff_base_ms: 0, backoff_factor: 2.0, backoff_jitter_ms: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
    pub bind: String,
    pub session_ttl_secs: u64,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8080".into(), session_ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub provider: ProviderCfg,
    pub generation: GenerationCfg,
    pub content: GenerationCfg,
    pub retry: RetryCfg,
    pub server: ServerCfg,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            provider: ProviderCfg::default(),
            generation: GenerationCfg::default(),
            content: GenerationCfg::content_defaults(),
            retry: RetryCfg::default(),
            server: ServerCfg::default(),
        }
    }
}

impl AppCfg {
    /// Reads the YAML config at `path` (defaults when absent) and applies
    /// environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let txt = tokio::fs::read_to_string(p)
                    .await
                    .context(format!("Failed to read config file: {}", p.display()))?;
                Self::from_yaml(&txt)?
            }
            None => Self::default(),
        };
        cfg.apply_overrides(|k| std::env::var(k).ok());
        cfg.check().context("Invalid configuration")?;
        Ok(cfg)
    }

    pub fn from_yaml(txt: &str) -> Result<Self> {
        serde_yaml::from_str(txt).context("Failed to parse config YAML")
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SOULFUL_BIND") { self.server.bind = v; }
        if let Some(v) = lookup("SOULFUL_PROVIDER") { self.provider.kind = v; }
        if let Some(v) = lookup("GEMINI_MODEL") { self.provider.model = v; }
        if let Some(v) = lookup("SOULFUL_RATE_PER_MIN").and_then(|v| v.parse().ok()) {
            self.provider.rate_per_min = v;
        }
    }

    /// Validates every section once so the rest of the program can assume
    /// well-formed parameters.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.generation.validate()?;
        self.content.validate()?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::MaxAttempts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reflection_sampling() {
        let g = AppCfg::default().generation.validate().unwrap();
        assert_eq!(g.temperature(), 0.7);
        assert_eq!(g.top_p(), 0.9);
        assert_eq!(g.max_output_tokens(), 60);
        assert_eq!(AppCfg::default().retry.max_attempts, 2);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = AppCfg::from_yaml("provider:\n  kind: mock\nserver:\n  bind: 0.0.0.0:9000\n").unwrap();
        assert_eq!(cfg.provider.kind, "mock");
        assert_eq!(cfg.provider.api_key_env, "GEMINI_API_KEY");
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.server.session_ttl_secs, 3600);
        assert_eq!(cfg.generation.max_output_tokens, 60);
    }

    #[test]
    fn rejects_out_of_range_sampling() {
        assert_eq!(GenerationConfig::new(2.5, 60, 0.9), Err(ConfigError::Temperature(2.5)));
        assert_eq!(GenerationConfig::new(0.7, 60, 0.0), Err(ConfigError::TopP(0.0)));
        assert_eq!(GenerationConfig::new(0.7, 0, 0.9), Err(ConfigError::MaxOutputTokens));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = AppCfg::default();
        cfg.apply_overrides(|k| match k {
            "SOULFUL_PROVIDER" => Some("mock".into()),
            "SOULFUL_RATE_PER_MIN" => Some("12".into()),
            _ => None,
        });
        assert_eq!(cfg.provider.kind, "mock");
        assert_eq!(cfg.provider.rate_per_min, 12);
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let mut cfg = AppCfg::default();
        cfg.retry.max_attempts = 0;
        assert_eq!(cfg.check(), Err(ConfigError::MaxAttempts));
    }
}
