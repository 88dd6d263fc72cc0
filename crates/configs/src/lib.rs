use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

pub const DEFAULT_INLINE_BLOB_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreEngine {
    #[default]
    File,
    /// Volatile; nothing survives the process. Never chosen implicitly.
    Memory,
}

impl std::str::FromStr for StoreEngine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreEngine::File),
            "memory" => Ok(StoreEngine::Memory),
            other => Err(anyhow!("store.engine must be `file` or `memory`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub engine: StoreEngine,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { name: default_store_name(), data_dir: default_data_dir(), engine: StoreEngine::File }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Files larger than this are kept as data URLs instead of raw blobs.
    #[serde(default = "default_inline_limit")]
    pub inline_blob_limit_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self { inline_blob_limit_bytes: DEFAULT_INLINE_BLOB_LIMIT }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: default_log_format() }
    }
}

fn default_store_name() -> String { "mypub-db".into() }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_inline_limit() -> usize { DEFAULT_INLINE_BLOB_LIMIT }
fn default_log_format() -> String { "compact".into() }

/// Load from `CONFIG_PATH` (default `config.toml`). A missing file yields
/// the defaults; a present but malformed file is an error.
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?;
    let cfg: AppConfig = toml::from_str(&content).with_context(|| format!("invalid config in {path}"))?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Environment overrides: `MYPUB_DATA_DIR`, `MYPUB_STORE_ENGINE`,
    /// `MYPUB_LOG_FORMAT`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("MYPUB_DATA_DIR").filter(|v| !v.trim().is_empty()) {
            self.store.data_dir = PathBuf::from(dir);
        }
        if let Some(engine) = lookup("MYPUB_STORE_ENGINE") {
            self.store.engine = engine.parse()?;
        }
        if let Some(format) = lookup("MYPUB_LOG_FORMAT") {
            self.logging.format = format;
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.store.validate()?;
        if self.media.inline_blob_limit_bytes == 0 {
            return Err(anyhow!("media.inline_blob_limit_bytes must be > 0"));
        }
        self.logging.normalize()?;
        Ok(())
    }
}

impl StoreConfig {
    fn validate(&mut self) -> Result<()> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(anyhow!("store.name must not be empty"));
        }
        if self.name.contains(['/', '\\']) {
            return Err(anyhow!("store.name must not contain path separators"));
        }
        if self.engine == StoreEngine::File && self.data_dir.as_os_str().is_empty() {
            return Err(anyhow!("store.data_dir is required for the file engine"));
        }
        Ok(())
    }
}

impl LoggingConfig {
    fn normalize(&mut self) -> Result<()> {
        let format = self.format.trim().to_ascii_lowercase();
        if format != "compact" && format != "json" {
            return Err(anyhow!("logging.format must be `compact` or `json`"));
        }
        self.format = format;
        Ok(())
    }
}
