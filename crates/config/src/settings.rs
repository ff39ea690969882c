// Pipeline settings
// Loaded from ~/.config/routegrid/settings.toml (or an explicit path)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Schema discovery bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub sample_size: usize,
    pub max_depth: usize,
    pub max_samples_per_path: usize,
    pub top_candidates: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            sample_size: 20,
            max_depth: 4,
            max_samples_per_path: 5,
            top_candidates: 10,
        }
    }
}

/// Supply selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Industry fit first, first-available when nothing fits
    #[default]
    CategoryFit,
    /// Always the first routable supply (legacy parity behavior)
    FirstAvailable,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CategoryFit => write!(f, "category_fit"),
            Self::FirstAvailable => write!(f, "first_available"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub strategy: MatchStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopySettings {
    /// Structural warnings become errors
    pub strict_mode: bool,
    /// Minimum trimmed presignal length that unlocks activity language
    pub min_presignal_chars: usize,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            strict_mode: false,
            min_presignal_chars: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Run snapshots kept (most recent first out)
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParitySettings {
    /// Consecutive full-parity runs required before "stable"
    pub stable_after: u32,
}

impl Default for ParitySettings {
    fn default() -> Self {
        Self { stable_after: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorSettings {
    /// Per-call timeout handed to collaborator clients
    pub timeout_secs: u64,
    /// Entities in flight per stage
    pub max_in_flight: usize,
}

impl Default for CollaboratorSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_in_flight: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub discovery: DiscoverySettings,
    pub matching: MatchingSettings,
    pub copy: CopySettings,
    pub history: HistorySettings,
    pub parity: ParitySettings,
    pub collaborators: CollaboratorSettings,
}

impl Settings {
    /// Default settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("routegrid")
            .join("settings.toml")
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from `path`, or from [`Settings::config_path`] when `None`.
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        let settings = Self::from_toml(&contents)?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.discovery;
        if d.sample_size == 0 {
            return Err(ConfigError::Validation(
                "discovery.sample_size must be at least 1".into(),
            ));
        }
        if d.max_depth == 0 {
            return Err(ConfigError::Validation(
                "discovery.max_depth must be at least 1".into(),
            ));
        }
        if d.max_samples_per_path == 0 || d.top_candidates == 0 {
            return Err(ConfigError::Validation(
                "discovery.max_samples_per_path and discovery.top_candidates must be at least 1"
                    .into(),
            ));
        }
        if self.history.capacity == 0 {
            return Err(ConfigError::Validation(
                "history.capacity must be at least 1".into(),
            ));
        }
        if self.parity.stable_after == 0 {
            return Err(ConfigError::Validation(
                "parity.stable_after must be at least 1".into(),
            ));
        }
        if self.collaborators.max_in_flight == 0 {
            return Err(ConfigError::Validation(
                "collaborators.max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_all_defaults() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.discovery.sample_size, 20);
        assert_eq!(s.copy.min_presignal_chars, 20);
        assert_eq!(s.parity.stable_after, 3);
        assert_eq!(s.matching.strategy, MatchStrategy::CategoryFit);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let s = Settings::from_toml(
            r#"
[matching]
strategy = "first_available"

[copy]
strict_mode = true
"#,
        )
        .unwrap();
        assert_eq!(s.matching.strategy, MatchStrategy::FirstAvailable);
        assert!(s.copy.strict_mode);
        assert_eq!(s.copy.min_presignal_chars, 20);
        assert_eq!(s.history.capacity, 10);
    }

    #[test]
    fn reject_unknown_strategy() {
        let err = Settings::from_toml("[matching]\nstrategy = \"best_effort\"\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn reject_zero_sizes() {
        let err = Settings::from_toml("[discovery]\nsample_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("sample_size"));
        let err = Settings::from_toml("[history]\ncapacity = 0\n").unwrap_err();
        assert!(err.to_string().contains("history.capacity"));
        let err = Settings::from_toml("[parity]\nstable_after = 0\n").unwrap_err();
        assert!(err.to_string().contains("stable_after"));
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let mut s = Settings::default();
        s.history.capacity = 4;
        s.copy.strict_mode = true;
        s.save(&path).unwrap();
        assert_eq!(Settings::load(Some(&path)).unwrap(), s);
    }
}
