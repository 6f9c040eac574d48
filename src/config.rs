//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - Built-in defaults
//! - TOML configuration file (config.toml, optional)
//! - Environment variables with APP_ prefix
//! - Deployment-platform variables: `HOST`, `PORT`, `DATABASE_URL`,
//!   `WHISPER_DISABLED`
//!
//! ## Degraded modes are configuration, not errors:
//! - No `DATABASE_URL` → the service runs without a durable store;
//!   registration returns 503 and analysis rows only reach the file sinks.
//! - `WHISPER_DISABLED=1` (or `transcription.enabled = false`) → no model is
//!   loaded and audio uploads return 503. This is how the service survives
//!   the memory limits of free hosting tiers.

use crate::scoring::ScoringPolicy;
use crate::transcription::ModelSize;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scoring: ScoringConfig,
    pub transcription: TranscriptionConfig,
    pub database: DatabaseConfig,
}

/// HTTP server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Clinical data directory holding the per-subject flat files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

/// Scoring policy selection.
///
/// `policy` is `"heuristic"` (word-count tiers) or `"structured_text"`
/// (parse a structured model answer, heuristic fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub policy: String,
}

/// Speech-to-text settings.
///
/// `model` must name a Whisper checkpoint size (tiny/base/small/medium/
/// large); `language` is an ISO 639-1 hint passed to the decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub enabled: bool,
    pub model: String,
    pub language: String,
}

/// PostgreSQL connection settings. `url = None` means no durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                data_dir: "datos_clinicos".to_string(),
            },
            scoring: ScoringConfig {
                policy: "heuristic".to_string(),
            },
            transcription: TranscriptionConfig {
                enabled: true,
                // Smallest checkpoint: the constrained hosts this service
                // targets cannot fit anything larger.
                model: "tiny".to_string(),
                language: "es".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration, later sources overriding earlier ones.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms export these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            settings = settings.set_override("database.url", url)?;
        }
        if env::var("WHISPER_DISABLED").as_deref() == Ok("1") {
            settings = settings.set_override("transcription.enabled", false)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly run.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("Storage data_dir cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("Database max_connections must be greater than 0"));
        }

        if self.transcription.enabled {
            self.transcription
                .model
                .parse::<ModelSize>()
                .map_err(|e| anyhow::anyhow!("Invalid transcription model: {}", e))?;
        }

        self.scoring_policy()
            .map_err(|e| anyhow::anyhow!("Invalid scoring policy: {}", e))?;

        Ok(())
    }

    /// Construct the configured scoring policy.
    pub fn scoring_policy(&self) -> Result<ScoringPolicy> {
        ScoringPolicy::from_config(&self.scoring.policy)
    }

    /// Checkpoint size to load, only meaningful when transcription is
    /// enabled and the configuration validated.
    pub fn whisper_model_size(&self) -> Result<ModelSize> {
        self.transcription.model.parse::<ModelSize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
        assert!(config.transcription.enabled);
        assert_eq!(config.transcription.language, "es");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_data_dir_rejected() {
        let mut config = AppConfig::default();
        config.storage.data_dir = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_model_rejected_only_when_enabled() {
        let mut config = AppConfig::default();
        config.transcription.model = "enormous".to_string();
        assert!(config.validate().is_err());

        // A bad model name is irrelevant while transcription is off.
        config.transcription.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_size_accessor() {
        let config = AppConfig::default();
        assert_eq!(
            config.whisper_model_size().unwrap(),
            ModelSize::Tiny
        );
    }

    #[test]
    fn test_unknown_scoring_policy_rejected() {
        let mut config = AppConfig::default();
        config.scoring.policy = "oracle".to_string();
        assert!(config.validate().is_err());

        config.scoring.policy = "structured_text".to_string();
        assert!(config.validate().is_ok());
    }
}
