//! Application configuration loaded from `config.json`.
//!
//! Built once at startup and passed by reference to whatever needs it.
//! Missing keys fall back to defaults; a missing file is created with the
//! defaults so users have something to edit.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::download::{
    CONNECT_TIMEOUT_SECS, DownloadOptions, HttpTimeouts, PAGE_TIMEOUT_SECS, READ_TIMEOUT_SECS,
};

/// Errors from loading or validating `config.json`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading, creating or writing the file failed.
    #[error("config file error at {path}: {source}")]
    Io {
        /// The config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for [`AppConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is outside its allowed range.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        /// JSON key of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Prompt styling, as `fg:<color> bg:<color> bold` token strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Selection pointer.
    pub pointer: String,
    /// Highlighted menu entry.
    pub highlighted: String,
    /// Prompt question text.
    pub question: String,
    /// Typed input text.
    pub text: String,
    /// Confirmed answer text.
    pub answer: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            pointer: "fg:#f38ba8 bold".to_string(),
            highlighted: "fg:#490d90 bg:#cba6f7 bold".to_string(),
            question: "fg:#cdd6f4 bold".to_string(),
            text: "fg:#cdd6f4".to_string(),
            answer: "fg:#c6a0f6 bold".to_string(),
        }
    }
}

/// Settings for a run of the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Default save directory (`~` expands to `$HOME`).
    pub save_path: String,
    /// Shorten long titles in the result picker.
    pub truncate_titles: bool,
    /// Maximum title length in the result picker, including the `...`.
    pub max_title_length: usize,
    /// Catalog base URL.
    pub catalog_url: String,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP stall timeout between body reads in seconds.
    pub read_timeout_secs: u64,
    /// Total timeout for search and landing page requests in seconds.
    pub page_timeout_secs: u64,
    /// Deadline for one whole mirror attempt in seconds; `0` disables it.
    pub mirror_timeout_secs: u64,
    /// Prompt styling.
    pub style: StyleConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            save_path: "~/books".to_string(),
            truncate_titles: true,
            max_title_length: 50,
            catalog_url: "http://libgen.rs".to_string(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            page_timeout_secs: PAGE_TIMEOUT_SECS,
            mirror_timeout_secs: 0,
            style: StyleConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses a config from JSON text and validates it. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at `path`, writing the defaults there first if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, created or parsed.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if !path.exists() {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
            let defaults = Self::default();
            let rendered =
                serde_json::to_string_pretty(&defaults).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            fs::write(path, rendered).map_err(io_error)?;
            info!(path = %path.display(), "wrote default config");
            return Ok(defaults);
        }

        let raw = fs::read_to_string(path).map_err(io_error)?;
        let config = Self::from_json(&raw, path)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_secs("connectTimeoutSecs", self.connect_timeout_secs)?;
        validate_timeout_secs("readTimeoutSecs", self.read_timeout_secs)?;
        validate_timeout_secs("pageTimeoutSecs", self.page_timeout_secs)?;
        if self.mirror_timeout_secs != 0 {
            validate_timeout_secs("mirrorTimeoutSecs", self.mirror_timeout_secs)?;
        }
        if self.max_title_length < 4 {
            return Err(ConfigError::Invalid {
                field: "maxTitleLength",
                message: format!("{}. Expected at least 4", self.max_title_length),
            });
        }
        if self.catalog_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "catalogUrl",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// HTTP client timeouts derived from this config.
    #[must_use]
    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
            page: Duration::from_secs(self.page_timeout_secs),
        }
    }

    /// Downloader options derived from this config.
    #[must_use]
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            mirror_timeout: (self.mirror_timeout_secs > 0)
                .then(|| Duration::from_secs(self.mirror_timeout_secs)),
        }
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            message: format!("{value}. Expected range: 1..=3600"),
        });
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/libgen/config.json`
/// 2. `$HOME/.config/libgen/config.json`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("libgen")
                .join("config.json"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("libgen")
            .join("config.json"),
    )
}

/// Expands a leading `~` or `~/` to `$HOME`. Other paths are returned unchanged.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    let Some(home) = env_var_non_empty_os("HOME") else {
        return PathBuf::from(path);
    };
    if path == "~" {
        PathBuf::from(home)
    } else if let Some(rest) = path.strip_prefix("~/") {
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
