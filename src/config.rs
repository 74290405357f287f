//! Configuration file loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::api::HttpTimeouts;
use crate::transfer::{DownloadMode, UploadMode};

/// Directory name under the XDG config home.
pub const CONFIG_DIR_NAME: &str = "shop-transfer";

/// TOML-backed defaults. Every key is optional; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Backend API root, e.g. `https://shop.example.com/api/`.
    pub api_base_url: Option<String>,
    /// Object-storage upload transport.
    pub upload_mode: Option<UploadMode>,
    /// Download transport.
    pub download_mode: Option<DownloadMode>,
    /// Directory prefix of preview objects.
    pub preview_prefix: Option<String>,
    /// Public base URL that preview object keys are appended to.
    pub preview_public_base_url: Option<String>,
    /// Path of the `pdftoppm` binary.
    pub pdftoppm_path: Option<PathBuf>,
    /// Default directory for downloads.
    pub output_dir: Option<PathBuf>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(base) = &self.api_base_url {
            let parsed = url::Url::parse(base)
                .with_context(|| format!("Invalid config value for `api_base_url`: {base}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("Invalid config value for `api_base_url`: {base}. Expected an http(s) URL");
            }
        }
        if let Some(base) = &self.preview_public_base_url
            && url::Url::parse(base).is_err()
        {
            bail!("Invalid config value for `preview_public_base_url`: {base}");
        }
        if let Some(prefix) = &self.preview_prefix
            && prefix.contains("..")
        {
            bail!("Invalid config value for `preview_prefix`: {prefix}. Must not contain `..`");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }

    /// Timeouts with defaults filled in.
    #[must_use]
    pub fn timeouts(&self) -> HttpTimeouts {
        let defaults = HttpTimeouts::default();
        HttpTimeouts {
            connect_secs: self.connect_timeout_secs.unwrap_or(defaults.connect_secs),
            read_secs: self.read_timeout_secs.unwrap_or(defaults.read_secs),
        }
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// The parsed config, or defaults when no file was loaded.
    #[must_use]
    pub fn config_or_default(&self) -> FileConfig {
        self.config.clone().unwrap_or_default()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/shop-transfer/config.toml`
/// 2. `$HOME/.config/shop-transfer/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config: Some(config),
            })
        }
        _ => Ok(LoadedConfig { path, config: None }),
    }
}

/// Loads and validates a config file; the file must exist.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses and validates TOML config text.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw).context("Invalid config syntax")?;
    config.validate()?;
    Ok(config)
}
