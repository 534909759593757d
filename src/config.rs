use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::family::GenerationMode;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub kinship: KinshipConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
}

/// Store and logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct KinshipConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

/// Traversal tuning
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraversalConfig {
    /// How `ancestors`/`descendants` count generations
    #[serde(default)]
    pub generation_mode: GenerationMode,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KINSHIP_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("KINSHIP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_file(&config_path)
    }

    /// Load and validate a specific config file
    pub fn from_file(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.kinship.db_path.as_os_str().is_empty() {
            anyhow::bail!("kinship.db_path must not be empty");
        }

        let level = self.kinship.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            anyhow::bail!(
                "kinship.log_level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.kinship.log_level
            );
        }

        if !self.kinship.migrations_dir.is_dir() {
            anyhow::bail!(
                "migrations_dir does not exist or is not a directory: {}",
                self.kinship.migrations_dir.display()
            );
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.kinship.db_path
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.kinship.migrations_dir
    }

    pub fn log_level(&self) -> &str {
        &self.kinship.log_level
    }

    pub fn generation_mode(&self) -> GenerationMode {
        self.traversal.generation_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn write_config(temp_dir: &TempDir, body: &str) -> PathBuf {
        fs::create_dir_all(temp_dir.path().join("migrations")).unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, body).unwrap();
        config_path.canonicalize().unwrap()
    }

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("KINSHIP_CONFIG").ok();
        std::env::set_var("KINSHIP_CONFIG", config_path.to_str().unwrap());
        f();
        std::env::remove_var("KINSHIP_CONFIG");
        if let Some(val) = original {
            std::env::set_var("KINSHIP_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            r#"
[kinship]
db_path = "./family.db"
log_level = "debug"

[traversal]
generation_mode = "expansions"
"#,
        );
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.log_level(), "debug");
            assert_eq!(config.db_path(), Path::new("./family.db"));
            assert_eq!(config.generation_mode(), GenerationMode::Expansions);
        });
    }

    #[test]
    fn test_config_defaults() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, "[kinship]\ndb_path = \"family.db\"\n");
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.migrations_dir(), Path::new("migrations"));
        assert_eq!(config.generation_mode(), GenerationMode::Levels);
    }

    #[test]
    fn test_config_rejects_unknown_log_level() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            "[kinship]\ndb_path = \"family.db\"\nlog_level = \"chatty\"\n",
        );
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let err = Config::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn test_config_rejects_missing_migrations_dir() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            "[kinship]\ndb_path = \"family.db\"\nmigrations_dir = \"nowhere\"\n",
        );
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();

        let err = Config::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("migrations_dir"));
    }

    #[test]
    fn test_config_rejects_unknown_generation_mode() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            "[kinship]\ndb_path = \"family.db\"\n\n[traversal]\ngeneration_mode = \"weekly\"\n",
        );
        assert!(Config::from_file(&config_path).is_err());
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("KINSHIP_CONFIG").ok();
        std::env::set_var("KINSHIP_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("KINSHIP_CONFIG");
        if let Some(v) = original {
            std::env::set_var("KINSHIP_CONFIG", v);
        }
    }
}
