//! Dropzone configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/dropzone/config.toml`
//! - Windows: `%APPDATA%/dropzone/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use dropzone_http::HttpTransportConfig;
use dropzone_transfer::UploadConstraints;
use serde::{Deserialize, Serialize};

/// Upload configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropzoneConfig {
    /// URL files are posted to.
    #[serde(default)]
    pub endpoint: String,

    /// Bearer token for the upload endpoint.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_token: String,

    /// Value of the `kind` form field.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Accepted types, e.g. `image/*,.pdf`. Empty accepts everything.
    #[serde(default)]
    pub accept: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,

    /// Upload every dropped file, or only the first.
    #[serde(default = "default_is_multi")]
    pub is_multi: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Return placeholder results instead of uploading.
    #[serde(default)]
    pub use_mock_results: bool,
}

fn default_is_multi() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for DropzoneConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_token: String::new(),
            kind: String::new(),
            accept: String::new(),
            min_size: None,
            max_size: None,
            is_multi: default_is_multi(),
            timeout_secs: default_timeout_secs(),
            use_mock_results: false,
        }
    }
}

impl DropzoneConfig {
    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads configuration from `path`, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: DropzoneConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let config = DropzoneConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix (may contain an API token).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Validation rules derived from the configuration.
    pub fn constraints(&self) -> anyhow::Result<UploadConstraints> {
        let accept = if self.accept.trim().is_empty() {
            None
        } else {
            Some(self.accept.parse()?)
        };

        Ok(UploadConstraints {
            accept,
            min_size: self.min_size,
            max_size: self.max_size,
            is_multi: self.is_multi,
        })
    }

    /// Settings for the HTTP transport.
    pub fn transport_config(&self) -> HttpTransportConfig {
        let mut config = HttpTransportConfig::new(self.endpoint.clone());
        config.api_token = non_empty(&self.api_token);
        config.kind = non_empty(&self.kind);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.use_mock_results = self.use_mock_results;
        config
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn config_path() -> anyhow::Result<PathBuf> {
    let config_dir = config_base_dir()?;
    Ok(config_dir.join("dropzone").join("config.toml"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config"))
    }
}
