use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DecError, DecResult};
use crate::types::{CipherVariant, OperationParameters};

/// Top-level configuration (loaded from decvol.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecConfig {
    pub volume: VolumeConfig,
    pub state: StateConfig,
    pub logging: LoggingConfig,
}

impl DecConfig {
    /// Load a config file, falling back to defaults when it does not exist.
    ///
    /// Callers report the fallback themselves, once their logging is up.
    pub fn load(path: &Path) -> DecResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| DecError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn to_toml(&self) -> DecResult<String> {
        toml::to_string_pretty(self).map_err(|e| DecError::Config(e.to_string()))
    }
}

/// Volume layout: cipher and the (w, s, v, l) parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Block cipher: "magma" (64-bit block) or "kuznyechik" (128-bit block)
    pub cipher: CipherVariant,
    /// Number of sections (w)
    pub sections: u64,
    /// Sectors per section (s)
    pub sectors_per_section: u64,
    /// Rekey frequency (v)
    pub rekey_frequency: u64,
    /// Sector length in bytes (l)
    pub sector_len: u64,
}

impl VolumeConfig {
    pub fn parameters(&self) -> OperationParameters {
        OperationParameters::new(
            self.sections,
            self.sectors_per_section,
            self.rekey_frequency,
            self.sector_len,
        )
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            cipher: CipherVariant::Narrow,
            sections: 1,
            sectors_per_section: 2,
            rekey_frequency: 3,
            sector_len: 16,
        }
    }
}

/// Counter persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// JSON file holding section and sector counters
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/decvol/counters.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
