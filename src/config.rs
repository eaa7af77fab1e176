use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name of the metadata store inside the vault root.
pub const DB_FILE_NAME: &str = "perdocman.db";
/// Directory (inside the vault root) holding copied documents.
pub const DOCUMENTS_DIR_NAME: &str = "documents";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    #[serde(default = "default_vault_root")]
    pub root: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: default_vault_root(),
        }
    }
}

fn default_vault_root() -> PathBuf {
    PathBuf::from("vault")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_list_limit")]
    pub list_limit: i64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Open the served URL in the default browser once bound.
    #[serde(default)]
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            list_limit: default_list_limit(),
            max_upload_bytes: default_max_upload_bytes(),
            open_browser: false,
        }
    }
}

fn default_bind() -> String {
    // Port 0 lets the OS pick a free port.
    "127.0.0.1:0".to_string()
}
fn default_list_limit() -> i64 {
    50
}
fn default_max_upload_bytes() -> usize {
    256 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_preview_pages")]
    pub preview_pages: usize,
    #[serde(default = "default_preview_max_chars")]
    pub preview_max_chars: usize,
    /// Files larger than this are stored without a preview.
    #[serde(default = "default_preview_max_bytes")]
    pub preview_max_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            preview_pages: default_preview_pages(),
            preview_max_chars: default_preview_max_chars(),
            preview_max_bytes: default_preview_max_bytes(),
        }
    }
}

fn default_preview_pages() -> usize {
    2
}
fn default_preview_max_chars() -> usize {
    1000
}
fn default_preview_max_bytes() -> u64 {
    64 * 1024 * 1024
}

/// Concrete on-disk locations derived from a vault root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub documents_dir: PathBuf,
}

impl VaultPaths {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            db_path: root.join(DB_FILE_NAME),
            documents_dir: root.join(DOCUMENTS_DIR_NAME),
            root,
        }
    }
}

/// Loads a TOML config file. A missing file yields the defaults; a present
/// but malformed one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.list_limit < 1 {
        anyhow::bail!("server.list_limit must be >= 1");
    }
    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }
    if config.ingest.preview_pages == 0 {
        anyhow::bail!("ingest.preview_pages must be > 0");
    }
    if config.ingest.preview_max_chars == 0 {
        anyhow::bail!("ingest.preview_max_chars must be > 0");
    }
    Ok(())
}
