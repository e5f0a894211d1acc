//! Host access configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    ENV_LOCK_TIMEOUT_MS, ENV_OS_RELEASE, ENV_PROC_DIR, FILE_LOCK_DEFAULT_TIMEOUT,
    HOST_PROC_DIRECTORY, OS_RELEASE_FILE_PATH,
};
use crate::{Error, NamespaceKind, Result};

/// Where host state lives and how long lock acquisition may take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Host `/proc` as seen from this process
    pub proc_dir: PathBuf,

    /// Release metadata consulted for the OS distribution
    pub os_release_path: PathBuf,

    /// Namespace category entered by the executor
    pub namespace: NamespaceKind,

    /// File lock acquisition timeout
    #[serde(with = "duration_millis")]
    pub lock_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            proc_dir: PathBuf::from(HOST_PROC_DIRECTORY),
            os_release_path: PathBuf::from(OS_RELEASE_FILE_PATH),
            namespace: NamespaceKind::Mount,
            lock_timeout: FILE_LOCK_DEFAULT_TIMEOUT,
        }
    }
}

impl HostConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `HOSTNS_*` environment variables
    ///
    /// # Errors
    /// Returns error if `HOSTNS_LOCK_TIMEOUT_MS` is not a number
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup(ENV_PROC_DIR) {
            self.proc_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_OS_RELEASE) {
            self.os_release_path = PathBuf::from(path);
        }
        if let Some(ms) = lookup(ENV_LOCK_TIMEOUT_MS) {
            let ms = ms.trim().parse::<u64>().map_err(|e| Error::InvalidConfig {
                message: format!("{ENV_LOCK_TIMEOUT_MS}={ms:?}: {e}"),
            })?;
            self.lock_timeout = Duration::from_millis(ms);
        }

        tracing::debug!(
            proc_dir = %self.proc_dir.display(),
            os_release = %self.os_release_path.display(),
            lock_timeout_ms = self.lock_timeout.as_millis(),
            "Loaded host configuration"
        );

        Ok(self)
    }

    /// Set the host proc directory
    #[must_use]
    pub fn with_proc_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.proc_dir = dir.into();
        self
    }

    /// Set the release metadata path
    #[must_use]
    pub fn with_os_release_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release_path = path.into();
        self
    }

    /// Set the namespace category
    #[must_use]
    pub fn with_namespace(mut self, kind: NamespaceKind) -> Self {
        self.namespace = kind;
        self
    }

    /// Set the lock timeout; zero selects the default
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Lock timeout with the zero-means-default rule applied
    #[must_use]
    pub fn effective_lock_timeout(&self) -> Duration {
        if self.lock_timeout.is_zero() {
            FILE_LOCK_DEFAULT_TIMEOUT
        } else {
            self.lock_timeout
        }
    }

    /// Namespace handle of `pid` for the configured category
    #[must_use]
    pub fn namespace_path(&self, pid: crate::ProcessId) -> PathBuf {
        namespace_path(&self.proc_dir, pid, self.namespace)
    }
}

/// `<proc_dir>/<pid>/ns/<kind>`
#[must_use]
pub fn namespace_path(proc_dir: &Path, pid: crate::ProcessId, kind: NamespaceKind) -> PathBuf {
    proc_dir
        .join(pid.to_string())
        .join("ns")
        .join(kind.proc_name())
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
