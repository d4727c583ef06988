//! Configuration management for nodeseal

use crate::crypto::PBKDF2_ITERATIONS;
use crate::envelope::{Algorithm, WireFormat};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log levels accepted in `logging.level`
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Encryption configuration
    #[serde(default)]
    pub encryption: EncryptionConfig,

    /// Worker pool configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Encryption configuration
///
/// Sender and receiver must agree on these values; the iteration count is
/// not recorded in the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// PBKDF2-HMAC-SHA256 iteration count
    pub kdf_iterations: u32,

    /// AEAD scheme used when sealing
    #[serde(default)]
    pub algorithm: Algorithm,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of seal/open jobs running at once
    pub max_concurrent: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path
    pub file: Option<PathBuf>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        EncryptionConfig {
            kdf_iterations: PBKDF2_ITERATIONS,
            algorithm: Algorithm::Aes256Gcm,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file, with environment variable overrides
    ///
    /// `.yaml` / `.yml` files are read as YAML, everything else as JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let parsed = match WireFormat::from_path(path) {
            WireFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
            WireFormat::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
        };
        let mut config: Config = parsed
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        // Override with environment variables if set
        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(iterations) = std::env::var("NODESEAL_KDF_ITERATIONS") {
            if let Ok(n) = iterations.trim().parse::<u32>() {
                self.encryption.kdf_iterations = n;
            }
        }

        if let Ok(max) = std::env::var("NODESEAL_MAX_CONCURRENT") {
            if let Ok(n) = max.trim().parse::<usize>() {
                self.worker.max_concurrent = n;
            }
        }

        if let Ok(level) = std::env::var("NODESEAL_LOG_LEVEL") {
            let level = level.trim().to_lowercase();
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Create a new config from defaults and environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match WireFormat::from_path(path) {
            WireFormat::Yaml => serde_yaml::to_string(self).map_err(|e| e.to_string()),
            WireFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
        }
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.encryption.kdf_iterations == 0 {
            return Err(Error::InvalidConfig(
                "KDF iteration count must be greater than 0".to_string(),
            ));
        }

        if self.worker.max_concurrent == 0 {
            return Err(Error::InvalidConfig(
                "Worker max_concurrent must be greater than 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }
}
