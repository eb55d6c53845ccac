//! Configuration Vault – reads/writes `~/.mnemos/config.toml`.
//!
//! One record per component, each with documented serde defaults, gathered
//! into [`MnemosConfig`].  `MNEMOS_*` environment variables override values
//! read from disk.

use std::fs;
use std::path::{Path, PathBuf};

use mnemos_memory::{EpisodicConfig, SemanticConfig, WorkingConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io { path: path.to_path_buf(), source }
    }
}

/// External embedding provider settings.
///
/// Passed through to whatever [`Embedder`][mnemos_memory::Embedder] the
/// caller builds; the engine itself does not interpret them.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Stored as plain text; the file is written owner-only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

impl std::fmt::Debug for EmbedderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .finish()
    }
}

/// Persisted engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MnemosConfig {
    #[serde(default)]
    pub working: WorkingConfig,
    #[serde(default)]
    pub episodic: EpisodicConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
}

/// Return the path to `~/.mnemos/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mnemos").join("config.toml")
}

/// Load the config from the default location.  Returns `None` if the file
/// does not exist.
pub fn load() -> Result<Option<MnemosConfig>, ConfigError> {
    load_from(&config_path())
}

/// Load the config from `path` and apply environment overrides.
pub fn load_from(path: &Path) -> Result<Option<MnemosConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let mut cfg: MnemosConfig = toml::from_str(&raw)?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `MNEMOS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MNEMOS_WORKING_MAX_ITEMS` | `working.max_items` |
/// | `MNEMOS_WORKING_MAX_TOKENS` | `working.max_tokens` |
/// | `MNEMOS_WORKING_TTL_SECS` | `working.ttl_secs` |
/// | `MNEMOS_EPISODIC_CAPACITY` | `episodic.capacity` |
/// | `MNEMOS_SEMANTIC_CAPACITY` | `semantic.capacity` |
/// | `MNEMOS_EMBEDDER_MODEL` | `embedder.model` |
/// | `MNEMOS_EMBEDDER_API_KEY` | `embedder.api_key` |
///
/// Unparsable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut MnemosConfig) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides_from(cfg: &mut MnemosConfig, lookup: impl Fn(&str) -> Option<String>) {
    let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(n) = number("MNEMOS_WORKING_MAX_ITEMS") {
        cfg.working.max_items = n as usize;
    }
    if let Some(n) = number("MNEMOS_WORKING_MAX_TOKENS") {
        cfg.working.max_tokens = n as usize;
    }
    if let Some(n) = number("MNEMOS_WORKING_TTL_SECS") {
        cfg.working.ttl_secs = n;
    }
    if let Some(n) = number("MNEMOS_EPISODIC_CAPACITY") {
        cfg.episodic.capacity = n as usize;
    }
    if let Some(n) = number("MNEMOS_SEMANTIC_CAPACITY") {
        cfg.semantic.capacity = n as usize;
    }
    if let Some(v) = lookup("MNEMOS_EMBEDDER_MODEL") {
        cfg.embedder.model = v;
    }
    if let Some(v) = lookup("MNEMOS_EMBEDDER_API_KEY") {
        cfg.embedder.api_key = v;
    }
}

/// Save the config to the default location, creating `~/.mnemos/` if
/// necessary.
pub fn save(cfg: &MnemosConfig) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

/// Save the config to `path` with owner-only permissions on Unix.
pub fn save_to(cfg: &MnemosConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| ConfigError::io(parent, e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| ConfigError::io(path, e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| ConfigError::io(path, e))?;
    Ok(())
}
