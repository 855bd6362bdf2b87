use crate::error::{FolderDbError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "FOLDERDB_CONFIG";
/// Environment variable overriding `base_directory`.
pub const DATA_DIR_ENV: &str = "FOLDERDB_DATA_DIR";
/// Environment variable overriding `images_folder`.
pub const IMAGES_FOLDER_ENV: &str = "FOLDERDB_IMAGES_FOLDER";

/// Storage settings: where data lives and how new ids are minted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage root. Relative paths are resolved against the working directory.
    pub base_directory: PathBuf,
    /// Folder under the root that holds image assets.
    pub images_folder: String,
    pub id_strategy: IdStrategy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            base_directory: PathBuf::from("data"),
            images_folder: "resources".to_string(),
            id_strategy: IdStrategy::Uuid,
        }
    }
}

/// How server-side identifiers are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    #[default]
    Uuid,
    Ulid,
    Nanoid,
}

impl IdStrategy {
    pub fn generate(&self) -> String {
        match self {
            IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            IdStrategy::Ulid => ulid::Ulid::new().to_string().to_lowercase(),
            IdStrategy::Nanoid => nanoid::nanoid!(),
        }
    }
}

impl StorageConfig {
    /// Parse a YAML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FolderDbError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse YAML config text. Missing keys take their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(StorageConfig::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Defaults, then the file named by `FOLDERDB_CONFIG` (or `explicit_file`),
    /// then individual environment overrides.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        let env_file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit_file.map(Path::to_path_buf).or(env_file) {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => StorageConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `FOLDERDB_*` overrides from `lookup`. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = non_blank(DATA_DIR_ENV) {
            self.base_directory = PathBuf::from(dir);
        }
        if let Some(folder) = non_blank(IMAGES_FOLDER_ENV) {
            self.images_folder = folder;
        }
    }

    /// The absolute storage root.
    pub fn resolved_root(&self) -> Result<PathBuf> {
        let base = if self.base_directory.as_os_str().is_empty() {
            Path::new("data")
        } else {
            self.base_directory.as_path()
        };
        let absolute = if base.is_absolute() {
            base.to_path_buf()
        } else {
            std::env::current_dir()?.join(base)
        };
        Ok(crate::path::normalize(&absolute))
    }

    /// The images folder name, falling back to `resources` when blank.
    pub fn images_folder(&self) -> &str {
        if self.images_folder.trim().is_empty() {
            "resources"
        } else {
            &self.images_folder
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = StorageConfig::from_yaml_str("").unwrap();
        assert_eq!(config, StorageConfig::default());
        assert_eq!(config.images_folder(), "resources");
    }

    #[test]
    fn test_partial_yaml() {
        let config = StorageConfig::from_yaml_str(
            "base_directory: /var/lib/folderdb\nid_strategy: ulid\n",
        )
        .unwrap();
        assert_eq!(config.base_directory, PathBuf::from("/var/lib/folderdb"));
        assert_eq!(config.images_folder, "resources");
        assert_eq!(config.id_strategy, IdStrategy::Ulid);
        assert_eq!(
            config.resolved_root().unwrap(),
            PathBuf::from("/var/lib/folderdb")
        );
    }

    #[test]
    fn test_unknown_strategy_is_an_error() {
        assert!(StorageConfig::from_yaml_str("id_strategy: sequential").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (DATA_DIR_ENV, "/tmp/store"),
            (IMAGES_FOLDER_ENV, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = StorageConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.base_directory, PathBuf::from("/tmp/store"));
        assert_eq!(config.images_folder, "resources");
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let config = StorageConfig::default();
        let root = config.resolved_root().unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with("data"));
    }

    #[test]
    fn test_id_strategies() {
        let uuid = IdStrategy::Uuid.generate();
        assert_eq!(uuid.len(), 36);
        let ulid = IdStrategy::Ulid.generate();
        assert_eq!(ulid.len(), 26);
        assert_eq!(ulid, ulid.to_lowercase());
        assert!(!IdStrategy::Nanoid.generate().is_empty());
        assert_ne!(IdStrategy::Uuid.generate(), uuid);
    }
}
