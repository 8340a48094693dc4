use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// File name looked up in the data directory when no `--config` is given
pub const CONFIG_FILE_NAME: &str = "package-quality.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Packages per chunk, 0 for the whole worklist
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Time between two estimations of the same package
    #[serde(default = "default_update_interval", with = "humantime_serde")]
    pub update_interval: Duration,

    /// Bound on every store operation
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub store_timeout: Duration,

    /// Duration to keep registry documents cached before re-fetching
    #[serde(default = "default_registry_cache_ttl", with = "humantime_serde")]
    pub registry_cache_ttl: Duration,

    /// Resolve deferred issue computations right after their chunk
    #[serde(default = "default_resolve_pending_inline")]
    pub resolve_pending_inline: bool,

    /// Concurrent issue page requests per repository
    #[serde(default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: usize,

    #[serde(default)]
    pub registry_url: Option<String>,

    #[serde(default)]
    pub downloads_url: Option<String>,

    #[serde(default)]
    pub issues_api_url: Option<String>,
}

const fn default_chunk_size() -> usize {
    100
}

const fn default_update_interval() -> Duration {
    Duration::from_hours(30 * 24)
}

const fn default_store_timeout() -> Duration {
    Duration::from_secs(2)
}

const fn default_registry_cache_ttl() -> Duration {
    Duration::from_secs(20)
}

const fn default_resolve_pending_inline() -> bool {
    true
}

const fn default_max_concurrent_pages() -> usize {
    8
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `package-quality.toml` in `data_dir` is used when present.
    pub fn load(data_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = data_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::try_default(),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Write the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        if let Some(parent) = output_path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{parent}'"))?;
        }

        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))
    }

    /// The configuration described by the embedded default file
    pub fn try_default() -> Result<Self> {
        toml::from_str(DEFAULT_CONFIG_TOML).into_app_err("parsing the built-in default configuration")
    }

    /// Chunk size for the scheduler, `None` meaning the whole worklist
    #[must_use]
    pub const fn chunk(&self, limit: Option<usize>) -> Option<usize> {
        let size = match limit {
            Some(limit) => limit,
            None => self.chunk_size,
        };

        if size == 0 { None } else { Some(size) }
    }

    fn validate(&self) -> Result<()> {
        if self.update_interval.is_zero() {
            return Err(app_err!("update_interval must be greater than zero"));
        }

        if self.store_timeout.is_zero() {
            return Err(app_err!("store_timeout must be greater than zero"));
        }

        if self.max_concurrent_pages == 0 {
            return Err(app_err!("max_concurrent_pages must be at least 1"));
        }

        for (key, value) in [
            ("registry_url", &self.registry_url),
            ("downloads_url", &self.downloads_url),
            ("issues_api_url", &self.issues_api_url),
        ] {
            if let Some(value) = value {
                let _ = url::Url::parse(value).into_app_err_with(|| format!("{key} is not a valid URL: '{value}'"))?;
            }
        }

        Ok(())
    }
}
