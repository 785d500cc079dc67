use crate::core::utxo::ScanMode;
use crate::mining::MAX_DIFFICULTY;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub difficulty: usize,
    pub genesis_recipient: String,
    pub scan_mode: ScanMode,
    pub max_submit_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 1,
            genesis_recipient: "Ivan".to_string(),
            scan_mode: ScanMode::Full,
            max_submit_attempts: 3,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds the {} hex digits of a block hash",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.genesis_recipient.is_empty() {
            return Err(LedgerError::Config("genesis recipient must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Config {
    /// Reads `path` when it exists, falls back to defaults otherwise, then
    /// applies environment overrides. The result is not validated: callers
    /// layer their own overrides first and call [`Config::validate`] once.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            _ => Self::default(),
        };

        config.apply_env()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.ledger.validate()?;
        if self.api.port == 0 {
            return Err(LedgerError::Config("API port must not be 0".to_string()));
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = env::var("PORT") {
            self.api.port = port
                .parse()
                .map_err(|_| LedgerError::Config(format!("invalid PORT: {}", port)))?;
        }
        if let Ok(difficulty) = env::var("LEDGER_DIFFICULTY") {
            self.ledger.difficulty = difficulty
                .parse()
                .map_err(|_| LedgerError::Config(format!("invalid LEDGER_DIFFICULTY: {}", difficulty)))?;
        }
        if let Ok(recipient) = env::var("LEDGER_GENESIS_RECIPIENT") {
            self.ledger.genesis_recipient = recipient;
        }
        Ok(())
    }
}
