use crate::error::GraphError;
use crate::identity::NameMatching;
use crate::settings::{builtin_palettes, ColorPalette};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_HISTORY_CAPACITY: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Undo and redo stacks are each bounded to this many snapshots.
    pub history_capacity: usize,
    pub name_matching: NameMatching,
    /// Palette catalog; the first entry is the default for new graphs.
    pub palettes: Vec<ColorPalette>,
    /// Store the state document zstd-compressed regardless of extension.
    pub compress_state: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            name_matching: NameMatching::Exact,
            palettes: builtin_palettes(),
            compress_state: false,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(EngineConfig::default());
        }
        let data = std::fs::read_to_string(path)?;
        let mut config: EngineConfig = serde_json::from_str(&data)?;
        if config.palettes.is_empty() {
            config.palettes = builtin_palettes();
        }
        if config.history_capacity == 0 {
            config.history_capacity = DEFAULT_HISTORY_CAPACITY;
        }
        info!(
            path = %path.display(),
            history_capacity = config.history_capacity,
            palettes = config.palettes.len(),
            "config loaded"
        );
        Ok(config)
    }

    pub fn default_palette_id(&self) -> &str {
        self.palettes
            .first()
            .map(|p| p.id.as_str())
            .unwrap_or(crate::settings::FALLBACK_PALETTE_ID)
    }

    pub fn palette(&self, id: &str) -> Option<&ColorPalette> {
        self.palettes.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.history_capacity, 3);
        assert_eq!(config.name_matching, NameMatching::Exact);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"history_capacity": 10, "name_matching": "normalized"}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.name_matching, NameMatching::Normalized);
        assert_eq!(config.palettes, builtin_palettes());
        assert!(!config.compress_state);
    }

    #[test]
    fn test_empty_palette_list_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"palettes": [], "history_capacity": 0}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(!config.palettes.is_empty());
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.default_palette_id(), config.palettes[0].id);
    }
}
