use std::path::{Path, PathBuf};

use color_eyre::{Result, eyre::Context};
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    database: String,
    upload_directory: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Allowed CORS origins. Empty means permissive.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_session_ttl_hours() -> i64 {
    DEFAULT_SESSION_TTL_HOURS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "~/.local/share/ispmedia/ispmedia.db".to_string(),
            upload_directory: "~/.local/share/ispmedia/uploads".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Config pointing at explicit paths, used by tests and the seed command
    pub fn with_paths(database: &Path, upload_directory: &Path) -> Self {
        Self {
            database: database.display().to_string(),
            upload_directory: upload_directory.display().to_string(),
            ..Self::default()
        }
    }

    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("ispmedia").join("config.toml"))
    }

    /// Load config from the default location, falling back to defaults when no file exists
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                log::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config to the default location unless one already exists
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine config directory"))?;

        if path.exists() {
            log::info!("Config already exists at {}", path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get expanded database path
    pub fn database_path(&self) -> PathBuf {
        self.expand_path(&self.database)
    }

    /// Get expanded upload directory path
    pub fn upload_directory_path(&self) -> PathBuf {
        self.expand_path(&self.upload_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            database = "/tmp/ispmedia.db"
            upload_directory = "/tmp/uploads"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/tmp/ispmedia.db"));
        assert_eq!(config.upload_directory_path(), PathBuf::from("/tmp/uploads"));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.session_ttl_hours, DEFAULT_SESSION_TTL_HOURS);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
            database = "db.sqlite"
            upload_directory = "uploads"
            max_upload_bytes = 1024
            session_ttl_hours = 2
            cors_origins = ["https://ispmedia.example"]
            "#,
        )
        .unwrap();

        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.session_ttl_hours, 2);
        assert_eq!(config.cors_origins, vec!["https://ispmedia.example"]);
    }

    #[test]
    fn test_missing_database_is_an_error() {
        assert!(Config::from_toml("upload_directory = \"uploads\"").is_err());
    }

    #[test]
    fn test_expand_home() {
        let config = Config::default();
        let path = config.database_path();
        if dirs::home_dir().is_some() {
            assert!(!path.starts_with("~"));
        }
        assert!(path.ends_with("ispmedia/ispmedia.db"));
    }
}
