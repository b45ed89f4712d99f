//! Persistence collaborators
//!
//! - `ConfigStore`: all-or-nothing read/write of the agent configuration
//! - `ChannelCatalog`: the universe of channel paths and the persisted subset

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::constants::{APP_NAME, CONFIG_FILE_NAME};
use crate::models::{AgentConfiguration, ConfigError};

/// Errors raised by the file-backed stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Persisted configuration, read and written as a whole
pub trait ConfigStore {
    fn read(&self) -> Result<AgentConfiguration, StoreError>;
    fn write(&self, config: &AgentConfiguration) -> Result<(), StoreError>;
}

/// Source of channel paths for the selection tree
pub trait ChannelCatalog {
    /// Every channel that can be selected
    fn all_channel_paths(&self) -> Result<Vec<String>, StoreError>;
    /// The subset selected the last time the configuration was saved
    fn selected_channel_paths(&self) -> Result<Vec<String>, StoreError>;
}

/// TOML file store with atomic replacement on write
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/logagent/config.toml`
    pub fn default_path() -> Result<PathBuf, StoreError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
            .ok_or(StoreError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigStore for TomlConfigStore {
    /// A missing file yields the defaults
    fn read(&self) -> Result<AgentConfiguration, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("No configuration at {}, using defaults", self.path.display());
                return Ok(AgentConfiguration::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let config: AgentConfiguration = toml::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write to a sibling temporary file, then rename over the target
    fn write(&self, config: &AgentConfiguration) -> Result<(), StoreError> {
        config.validate()?;
        let content = toml::to_string_pretty(config)?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.write_error(e))?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| CONFIG_FILE_NAME.to_string());
        let temp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        let result = (|| -> io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(err) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(self.write_error(err));
        }

        debug!("Configuration written to {}", self.path.display());
        Ok(())
    }
}

/// Channel universe from a text file, one path per line
///
/// Blank lines and lines starting with `#` are ignored.
#[derive(Debug, Clone)]
pub struct FileChannelCatalog {
    path: PathBuf,
    selected: Vec<String>,
}

impl FileChannelCatalog {
    pub fn new(path: impl Into<PathBuf>, selected: Vec<String>) -> Self {
        Self {
            path: path.into(),
            selected,
        }
    }
}

impl ChannelCatalog for FileChannelCatalog {
    fn all_channel_paths(&self) -> Result<Vec<String>, StoreError> {
        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(parse_channel_list(&content))
    }

    fn selected_channel_paths(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.selected.clone())
    }
}

pub fn parse_channel_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::new(dir.path().join("config.toml"));
        assert_eq!(store.read().unwrap(), AgentConfiguration::default());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::new(dir.path().join("nested").join("config.toml"));

        let mut config = AgentConfiguration::default();
        config.primary.host = "logs.example.com".to_string();
        config.channels.selected = vec!["Application".to_string(), "System-Log/Security".to_string()];
        store.write(&config).unwrap();

        assert_eq!(store.read().unwrap(), config);
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_invalid_configuration_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = TomlConfigStore::new(&path);

        let mut config = AgentConfiguration::default();
        config.forwarding.facility = 30;
        assert!(matches!(store.write(&config), Err(StoreError::Invalid(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_rejects_bad_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = TomlConfigStore::new(&path);

        fs::write(&path, "primary = [").unwrap();
        assert!(matches!(store.read(), Err(StoreError::Parse { .. })));

        fs::write(&path, "[diagnostics]\ndebug_level = 12\n").unwrap();
        let err = store.read().unwrap_err();
        assert!(err.to_string().contains("diagnostics.debug_level"));
    }

    #[test]
    fn test_channel_list_parsing() {
        let parsed = parse_channel_list("# exported channels\nApplication\n\n  System-Log/Security  \n#Setup\n");
        assert_eq!(parsed, vec!["Application", "System-Log/Security"]);
    }

    #[test]
    fn test_file_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.txt");
        fs::write(&path, "Application\nSystem\n").unwrap();

        let catalog = FileChannelCatalog::new(&path, vec!["System".to_string()]);
        assert_eq!(catalog.all_channel_paths().unwrap(), vec!["Application", "System"]);
        assert_eq!(catalog.selected_channel_paths().unwrap(), vec!["System"]);

        let missing = FileChannelCatalog::new(dir.path().join("none.txt"), Vec::new());
        assert!(matches!(missing.all_channel_paths(), Err(StoreError::Read { .. })));
    }
}
