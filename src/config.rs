//! Installer configuration.
//!
//! Everything environment-derived is gathered here once and handed to the
//! [`Installer`](crate::installer::Installer) explicitly.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const PREFIX_ENV: &str = "BREWSMITH_PREFIX";
pub const MAKE_ENV: &str = "BREWSMITH_MAKE";
pub const CMAKE_ENV: &str = "BREWSMITH_CMAKE";
pub const FETCH_TIMEOUT_ENV: &str = "BREWSMITH_FETCH_TIMEOUT";
pub const JOBS_ENV: &str = "BREWSMITH_JOBS";
pub const TEMP_ENV: &str = "BREWSMITH_TEMP";

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Config {
    /// Kegs live at `<prefix_base>/<name>/<version>`
    pub prefix_base: PathBuf,
    /// Applies to the fetch stage only
    pub fetch_timeout: Duration,
    /// Parallel make jobs
    pub jobs: usize,
    pub make: PathBuf,
    pub cmake: PathBuf,
    /// Parent of the per-run scoped work directories
    pub temp_root: PathBuf,
}

impl Config {
    /// Build a configuration from `BREWSMITH_*` environment variables
    pub fn from_env() -> Self {
        let prefix_base = env::var_os(PREFIX_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_prefix_base);

        let fetch_timeout = parse_env::<u64>(FETCH_TIMEOUT_ENV)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);

        let jobs = parse_env::<usize>(JOBS_ENV)
            .filter(|jobs| *jobs > 0)
            .unwrap_or_else(default_jobs);

        Self {
            prefix_base,
            fetch_timeout,
            jobs,
            make: env::var_os(MAKE_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("make")),
            cmake: env::var_os(CMAKE_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cmake")),
            temp_root: env::var_os(TEMP_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        }
    }

    /// Configuration rooted at an explicit prefix base, everything else defaulted
    pub fn with_prefix_base(prefix_base: impl Into<PathBuf>) -> Self {
        Self {
            prefix_base: prefix_base.into(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            jobs: default_jobs(),
            make: PathBuf::from("make"),
            cmake: PathBuf::from("cmake"),
            temp_root: env::temp_dir(),
        }
    }

    /// Install prefix of one formula version
    pub fn keg_path(&self, name: &str, version: &str) -> PathBuf {
        self.prefix_base.join(name).join(version)
    }
}

fn default_prefix_base() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".brewsmith").join("Cellar")
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}
