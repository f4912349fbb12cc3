//! Configuration for artifex.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ARTIFEX_HOME, ARTIFEX_STORE)
//! 2. Config file (.artifex/config.yaml)
//! 3. Defaults (~/.artifex)
//!
//! Config file discovery:
//! - Searches current directory and parents for .artifex/config.yaml
//! - Paths in config file are relative to the .artifex/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::DEFAULT_TIMEOUT;
use crate::core::BatchConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".artifex";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub journal: Option<JournalConfig>,
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
    #[serde(default)]
    pub batch: Option<BatchDefaultsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory
    pub home: Option<String>,
    /// Collection store directory
    pub store: Option<String>,
    /// Blob directory
    pub blobs: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchDefaultsConfig {
    pub max_batch_size: Option<usize>,
    pub concurrency: Option<usize>,
}

/// Generation command settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorSettings {
    /// Program to spawn; `None` leaves generated types unavailable
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_seconds: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl GeneratorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Engine state directory
    pub home: PathBuf,
    /// Directory holding one JSON file per collection
    pub store: PathBuf,
    /// Directory holding content-addressed blobs
    pub blobs: PathBuf,
    /// Whether lifecycle events are journaled
    pub journal_enabled: bool,
    pub generator: GeneratorSettings,
    /// Batch limits for types that declare none
    pub batch: BatchConfig,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Defaults rooted at `home`
    pub fn rooted_at(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            store: home.join("store"),
            blobs: home.join("blobs"),
            home,
            journal_enabled: true,
            generator: GeneratorSettings::default(),
            batch: BatchConfig::default(),
            config_file: None,
        }
    }

    /// Lifecycle journal path ($ARTIFEX_HOME/journal.jsonl)
    pub fn journal_path(&self) -> PathBuf {
        self.home.join("journal.jsonl")
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Environment overrides, read once per load
struct EnvOverrides {
    home: Option<PathBuf>,
    store: Option<PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            home: std::env::var("ARTIFEX_HOME").ok().map(PathBuf::from),
            store: std::env::var("ARTIFEX_STORE").ok().map(PathBuf::from),
        }
    }
}

/// Merge a parsed config file (if any) with overrides and defaults
fn resolve(
    default_home: PathBuf,
    file: Option<(PathBuf, ConfigFile)>,
    env: EnvOverrides,
) -> ResolvedConfig {
    let (config_path, config) = match file {
        Some((path, config)) => (Some(path), Some(config)),
        None => (None, None),
    };
    // Relative paths in the file resolve against .artifex/
    let config_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    let relative = |value: &Option<String>| -> Option<PathBuf> {
        match (&config_dir, value) {
            (Some(dir), Some(value)) => Some(resolve_path(dir, value)),
            _ => None,
        }
    };

    let paths = config.as_ref().map(|c| c.paths.clone()).unwrap_or_default();

    let home = env
        .home
        .or_else(|| relative(&paths.home))
        .unwrap_or(default_home);
    let mut resolved = ResolvedConfig::rooted_at(home);

    if let Some(store) = env.store.or_else(|| relative(&paths.store)) {
        resolved.store = store;
    }
    if let Some(blobs) = relative(&paths.blobs) {
        resolved.blobs = blobs;
    }

    if let Some(config) = config {
        if let Some(enabled) = config.journal.and_then(|j| j.enabled) {
            resolved.journal_enabled = enabled;
        }
        if let Some(generator) = config.generator {
            resolved.generator = GeneratorSettings {
                command: generator.command,
                args: generator.args,
                timeout_seconds: generator
                    .timeout_seconds
                    .unwrap_or(resolved.generator.timeout_seconds),
            };
        }
        if let Some(batch) = config.batch {
            let defaults = BatchConfig::default();
            resolved.batch = BatchConfig {
                max_batch_size: batch.max_batch_size.unwrap_or(defaults.max_batch_size),
                concurrency: batch.concurrency.unwrap_or(defaults.concurrency).max(1),
            };
        }
    }

    resolved.config_file = config_path;
    resolved
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let file = match find_config_file(&cwd) {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    Ok(resolve(default_home, file, EnvOverrides::from_env()))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env() -> EnvOverrides {
        EnvOverrides {
            home: None,
            store: None,
        }
    }

    fn write_config(temp: &TempDir, body: &str) -> PathBuf {
        let dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(PathBuf::from("/u/.artifex"), None, no_env());

        assert_eq!(config.home, PathBuf::from("/u/.artifex"));
        assert_eq!(config.store, PathBuf::from("/u/.artifex/store"));
        assert_eq!(config.blobs, PathBuf::from("/u/.artifex/blobs"));
        assert!(config.journal_enabled);
        assert!(config.generator.command.is_none());
        assert_eq!(config.batch, BatchConfig::default());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  store: ../data
journal:
  enabled: false
generator:
  command: llm
  args: ["-m", "small"]
  timeout_seconds: 30
batch:
  concurrency: 0
"#,
        );

        let file = load_config_file(&path).unwrap();
        assert_eq!(file.version, "1.0");
        assert_eq!(file.paths.store.as_deref(), Some("../data"));

        let config = resolve(PathBuf::from("/u/.artifex"), Some((path.clone(), file)), no_env());
        assert!(!config.journal_enabled);
        assert_eq!(config.generator.command.as_deref(), Some("llm"));
        assert_eq!(config.generator.args, vec!["-m", "small"]);
        assert_eq!(config.generator.timeout(), Duration::from_secs(30));
        assert_eq!(config.batch.max_batch_size, BatchConfig::default().max_batch_size);
        assert_eq!(config.batch.concurrency, 1);
        assert!(config.store.ends_with("data"));
        assert_eq!(config.config_file, Some(path));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "version: \"1.0\"\npaths:\n  home: ./state\n");
        let file = load_config_file(&path).unwrap();

        let env = EnvOverrides {
            home: Some(PathBuf::from("/env/home")),
            store: Some(PathBuf::from("/env/store")),
        };
        let config = resolve(PathBuf::from("/u/.artifex"), Some((path, file)), env);

        assert_eq!(config.home, PathBuf::from("/env/home"));
        assert_eq!(config.store, PathBuf::from("/env/store"));
        assert_eq!(config.blobs, PathBuf::from("/env/home/blobs"));
    }

    #[test]
    fn test_discovery_searches_parents() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "version: \"1.0\"");
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file(&nested), Some(path));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
