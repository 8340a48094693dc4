//! Setup shared by the commands that estimate packages.

use super::Host;
use super::config::Config;
use crate::Result;
use crate::batch::{BatchReport, BatchScheduler, FileCollection, SchedulerOptions};
use crate::estimation::{Estimator, EstimatorOptions};
use crate::facts::cache::Cache;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use directories::BaseDirs;
use ohno::{IntoAppError, app_err};
use std::io::Write;

/// Name of the directory holding this tool's state under the platform data directory
const APP_DIR_NAME: &str = "package-quality";

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by every command that touches the stores or the network
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// Path to configuration file (default is `package-quality.toml` in the data directory)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the package and pending collections and the registry cache
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<Utf8PathBuf>,

    /// Packages per chunk, overriding the configuration (0 for the whole worklist)
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Ignore cached registry documents and fetch everything fresh
    #[arg(long)]
    pub ignore_cached: bool,
}

/// Resolve the data directory: the given path, or the platform data directory
pub fn data_dir(explicit: Option<&Utf8PathBuf>) -> Result<Utf8PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }

    let dir = BaseDirs::new()
        .into_app_err("could not determine the data directory")?
        .data_dir()
        .join(APP_DIR_NAME);

    Utf8PathBuf::from_path_buf(dir).map_err(|dir| app_err!("data directory '{}' is not valid UTF-8", dir.display()))
}

/// The configured pieces a command works with
#[derive(Debug)]
pub struct Common {
    pub config: Config,
    pub data_dir: Utf8PathBuf,
    pub estimator: Estimator,
    chunk_size: Option<usize>,
}

impl Common {
    /// Initialize logging, load the configuration, and build the estimator
    pub fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let data_dir = data_dir(args.data_dir.as_ref())?;
        let config = Config::load(&data_dir, args.config.as_ref())?;

        let registry_cache = Cache::new(
            data_dir.join("cache").join("registry").into_std_path_buf(),
            config.registry_cache_ttl,
            args.ignore_cached,
        );

        let estimator = Estimator::new(EstimatorOptions {
            github_token: args.github_token.clone(),
            registry_url: config.registry_url.clone(),
            downloads_url: config.downloads_url.clone(),
            issues_api_url: config.issues_api_url.clone(),
            registry_cache: Some(registry_cache),
            max_concurrent_pages: config.max_concurrent_pages,
            update_interval: config.update_interval,
        })?;

        if args.github_token.is_none() {
            log::warn!("No GitHub token given, the issue tracker allows only a few calls per hour");
        }

        Ok(Self {
            chunk_size: config.chunk(args.limit),
            config,
            data_dir,
            estimator,
        })
    }

    #[must_use]
    pub fn packages(&self) -> FileCollection {
        FileCollection::new(self.data_dir.join("packages"))
    }

    #[must_use]
    pub fn pending(&self) -> FileCollection {
        FileCollection::new(self.data_dir.join("pending"))
    }

    /// Default worklist location inside the data directory
    #[must_use]
    pub fn default_worklist(&self) -> Utf8PathBuf {
        self.data_dir.join("all.json")
    }

    /// Build a scheduler over the file-backed collections
    #[must_use]
    pub fn scheduler(self, respect_schedule: bool) -> BatchScheduler<Estimator, FileCollection, FileCollection> {
        let options = SchedulerOptions {
            chunk_size: self.chunk_size,
            store_timeout: self.config.store_timeout,
            resolve_inline: self.config.resolve_pending_inline,
            respect_schedule,
        };

        let packages = self.packages();
        let pending = self.pending();
        BatchScheduler::new(self.estimator, packages, pending, options)
    }
}

/// Initialize the logger from the requested level, `RUST_LOG` taking precedence
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // a second initialization (several commands in one test process) is harmless
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}

/// Print the summary of a batch run
pub fn write_report<H: Host>(host: &mut H, report: &BatchReport) {
    let mut out = host.output();
    let _ = writeln!(out, "Chunks processed:    {}", report.chunks_processed);
    let _ = writeln!(out, "Estimated:           {}", report.estimated);
    let _ = writeln!(out, "Deferred:            {}", report.deferred);
    let _ = writeln!(out, "Resolved:            {}", report.resolved);
    let _ = writeln!(out, "Skipped (not due):   {}", report.skipped);
    let _ = writeln!(out, "Failed (kept):       {}", report.failed);
    let _ = writeln!(out, "  quota exhausted:   {}", report.quota_exhausted);
    let _ = writeln!(out, "Invalid entries:     {}", report.invalid);
    let _ = writeln!(out, "Store failures:      {}", report.store_failures);
    let _ = writeln!(out, "Waited for quota:    {}s", report.waited.as_secs());
}

/// Resolve a worklist path relative to the data directory default
#[must_use]
pub fn worklist_path(common: &Common, explicit: Option<&Utf8PathBuf>) -> Utf8PathBuf {
    explicit.cloned().unwrap_or_else(|| common.default_worklist())
}

#[must_use]
pub fn config_path(data_dir: &Utf8Path) -> Utf8PathBuf {
    data_dir.join(super::config::CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_wins() {
        let dir = Utf8PathBuf::from("/tmp/pq");
        assert_eq!(data_dir(Some(&dir)).unwrap(), dir);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn layout_under_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let args = CommonArgs {
            github_token: Some("t".to_string()),
            config: None,
            data_dir: Some(dir.clone()),
            limit: Some(3),
            log_level: LogLevel::None,
            ignore_cached: false,
        };

        let common = Common::new(&args).unwrap();

        assert_eq!(common.packages().dir(), dir.join("packages").as_std_path());
        assert_eq!(common.pending().dir(), dir.join("pending").as_std_path());
        assert_eq!(common.default_worklist(), dir.join("all.json"));
        assert_eq!(worklist_path(&common, None), dir.join("all.json"));
        assert_eq!(common.chunk_size, Some(3));
        assert_eq!(config_path(&dir), dir.join("package-quality.toml"));
    }
}
