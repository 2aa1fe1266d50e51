//! Configuration for anchorkit.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ANCHORKIT_HOME, ANCHORKIT_EMBEDDING_URL, ANCHORKIT_EMBEDDING_MODEL)
//! 2. Config file (.anchorkit/config.yaml)
//! 3. Defaults (~/.anchorkit)
//!
//! Config file discovery:
//! - Searches current directory and parents for .anchorkit/config.yaml
//! - `paths.home` is relative to the .anchorkit/ directory
//! - `paths.store`, `paths.snapshots` and `paths.logs` are relative to home

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::RecoveryConfig;
use crate::matching::MatcherConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".anchorkit";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub matching: MatcherConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .anchorkit/)
    pub home: Option<String>,
    /// Anchor records (relative to home)
    pub store: Option<String>,
    /// Document snapshots (relative to home)
    pub snapshots: Option<String>,
    /// Recovery audit logs (relative to home)
    pub logs: Option<String>,
}

/// Embedding service location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/embeddings".to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Engine state directory
    pub home: PathBuf,
    pub store_dir: PathBuf,
    pub snapshots_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub matching: MatcherConfig,
    pub recovery: RecoveryConfig,
    pub embedding: EmbeddingConfig,
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

/// Load configuration, discovering the config file from `start`
fn load_config_from(start: &Path) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = find_config_file(start);
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    let home = if let Ok(env_home) = std::env::var("ANCHORKIT_HOME") {
        PathBuf::from(env_home)
    } else {
        match (&config_file, file.as_ref().and_then(|f| f.paths.home.as_ref())) {
            (Some(config_path), Some(home_path)) => {
                let config_dir = config_path.parent().unwrap_or(Path::new("."));
                resolve_path(config_dir, home_path)
            }
            _ => default_home,
        }
    };

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();
    let under_home = |configured: &Option<String>, fallback: &str| match configured {
        Some(p) => resolve_path(&home, p),
        None => home.join(fallback),
    };
    let store_dir = under_home(&paths.store, "anchors");
    let snapshots_dir = under_home(&paths.snapshots, "snapshots");
    let logs_dir = under_home(&paths.logs, "logs");

    let (matching, recovery, mut embedding) = match file {
        Some(f) => (f.matching, f.recovery, f.embedding),
        None => Default::default(),
    };

    if let Ok(url) = std::env::var("ANCHORKIT_EMBEDDING_URL") {
        embedding.endpoint = url;
    }
    if let Ok(model) = std::env::var("ANCHORKIT_EMBEDDING_MODEL") {
        embedding.model = model;
    }

    Ok(ResolvedConfig {
        home,
        store_dir,
        snapshots_dir,
        logs_dir,
        config_file,
        matching,
        recovery,
        embedding,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd)
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

/// Get the anchor store directory
pub fn store_dir() -> Result<PathBuf> {
    Ok(config()?.store_dir.clone())
}

/// Get the snapshot directory
pub fn snapshots_dir() -> Result<PathBuf> {
    Ok(config()?.snapshots_dir.clone())
}

/// Get the recovery log directory
pub fn logs_dir() -> Result<PathBuf> {
    Ok(config()?.logs_dir.clone())
}
