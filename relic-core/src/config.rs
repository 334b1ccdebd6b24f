//! Configuration for the artifact subsystem.
//!
//! Maps directly to `relic.toml`; every field has a serde default so a
//! missing file or section falls back to stock server behavior.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelicConfig {
    /// Experience and leveling settings.
    #[serde(default)]
    pub progression: ProgressionConfig,
    /// Encounter credit settings.
    #[serde(default)]
    pub credit: CreditConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl RelicConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`crate::ArtifactError::Config`] if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::ArtifactError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Experience rate tuning.
///
/// All artifacts share one threshold table; they level at different
/// speeds through their per-artifact rate numerator divided by the
/// global divisor configured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Global denominator applied to every artifact's XP rate.
    #[serde(default = "default_xp_rate_divisor")]
    pub xp_rate_divisor: u32,
    /// Percentage bonus applied when the holder's guild carries the
    /// artifact-XP buff.
    #[serde(default = "default_guild_bonus_percent")]
    pub guild_bonus_percent: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_rate_divisor: default_xp_rate_divisor(),
            guild_bonus_percent: default_guild_bonus_percent(),
        }
    }
}

/// Encounter credit tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditConfig {
    /// Interaction radius (world units) within which players receive
    /// credit when a tracked NPC dies.
    #[serde(default = "default_credit_radius")]
    pub radius: u32,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            radius: default_credit_radius(),
        }
    }
}

/// Persistence / save settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable SQLite WAL mode for concurrent reads during gameplay.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { wal_mode: true }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_xp_rate_divisor() -> u32 {
    350
}

fn default_guild_bonus_percent() -> u32 {
    5
}

fn default_credit_radius() -> u32 {
    3500
}

fn default_true() -> bool {
    true
}
