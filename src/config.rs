//! Deployer configuration.
//!
//! Read once at startup and immutable afterwards. The pipeline never reads
//! the process environment itself; everything it needs is threaded through
//! [`DeployerConfig`].

use crate::constants::{
    ALWAYS_PULL_ENV, DEFAULT_LOG_HELPER, DEFAULT_SECRET_MOUNT_PATH, SECRET_MOUNT_PATH_ENV,
    SNAPSHOTTER_ENV,
};
use std::env;
use std::path::PathBuf;
use tracing::warn;

/// Configuration shared by every deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployerConfig {
    /// Host directory holding one file per secret.
    pub secret_mount_path: PathBuf,
    /// Directory supplying `resolv.conf` and `hosts`.
    pub working_dir: PathBuf,
    /// Snapshotter (storage driver); empty selects the runtime default.
    pub snapshotter: String,
    /// Pull images on every deploy even if cached.
    pub always_pull: bool,
    /// Binary receiving each task's stdio.
    pub log_helper: PathBuf,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            secret_mount_path: PathBuf::from(DEFAULT_SECRET_MOUNT_PATH),
            working_dir: PathBuf::from("."),
            snapshotter: String::new(),
            always_pull: false,
            log_helper: PathBuf::from(DEFAULT_LOG_HELPER),
        }
    }
}

impl DeployerConfig {
    /// Loads configuration from the process environment.
    ///
    /// | Variable            | Field               | Default                      |
    /// |---------------------|---------------------|------------------------------|
    /// | `snapshotter`       | `snapshotter`       | runtime default              |
    /// | `secret_mount_path` | `secret_mount_path` | `/var/lib/faasd-provider/secrets` |
    /// | `always_pull`       | `always_pull`       | `false`                      |
    ///
    /// `working_dir` is the current directory.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(snapshotter) = env::var(SNAPSHOTTER_ENV) {
            config.snapshotter = snapshotter;
        }

        if let Ok(path) = env::var(SECRET_MOUNT_PATH_ENV) {
            if !path.is_empty() {
                config.secret_mount_path = PathBuf::from(path);
            }
        }

        if let Ok(value) = env::var(ALWAYS_PULL_ENV) {
            config.always_pull = parse_bool(&value).unwrap_or_else(|| {
                warn!(value = %value, "Ignoring invalid {} value", ALWAYS_PULL_ENV);
                false
            });
        }

        match env::current_dir() {
            Ok(dir) => config.working_dir = dir,
            Err(e) => warn!(error = %e, "Unable to resolve working directory, using '.'"),
        }

        config
    }

    /// Sets the secrets root directory.
    pub fn with_secret_mount_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.secret_mount_path = path.into();
        self
    }

    /// Sets the directory supplying `resolv.conf` and `hosts`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Sets the snapshotter.
    pub fn with_snapshotter(mut self, snapshotter: impl Into<String>) -> Self {
        self.snapshotter = snapshotter.into();
        self
    }

    /// Sets whether images are always pulled.
    pub fn with_always_pull(mut self, always_pull: bool) -> Self {
        self.always_pull = always_pull;
        self
    }

    /// Sets the stdio logging binary.
    pub fn with_log_helper(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_helper = path.into();
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
