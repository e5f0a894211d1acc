//! Process resolution and host environment detection

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use hostns_core::constants::OS_DISTRO_TALOS_LINUX;
use hostns_core::{Error, HostConfig, ProcessId, ProcessName, Result};

use crate::executor::NamespaceExecutor;
use crate::fs::HostFs;
use crate::lock::FileLock;

/// Find the PID whose namespace `process` refers to
///
/// `ProcessName::None` resolves to `None`: the caller stays where it is.
/// Named processes are matched on `<proc_dir>/<pid>/comm`; the lowest PID wins.
///
/// # Errors
/// Returns [`Error::ProcessNotFound`] if no process matches
pub fn resolve_process(proc_dir: &Path, process: &ProcessName) -> Result<Option<ProcessId>> {
    match process {
        ProcessName::None => Ok(None),
        ProcessName::Init => {
            if proc_dir.join(ProcessId::INIT.to_string()).is_dir() {
                Ok(Some(ProcessId::INIT))
            } else {
                Err(Error::ProcessNotFound {
                    name: process.to_string(),
                })
            }
        }
        ProcessName::Named(name) => {
            let comm = process.comm().unwrap_or(name.as_str());
            find_by_comm(proc_dir, comm)
                .map(Some)
                .ok_or_else(|| Error::ProcessNotFound { name: name.clone() })
        }
    }
}

fn find_by_comm(proc_dir: &Path, comm: &str) -> Option<ProcessId> {
    let entries = match fs::read_dir(proc_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(
                proc_dir = %proc_dir.display(),
                error = %e,
                "Failed to scan proc directory"
            );
            return None;
        }
    };

    entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let pid = entry.file_name().to_str()?.parse::<ProcessId>().ok()?;
            let name = fs::read_to_string(entry.path().join("comm")).ok()?;
            (name.trim_end_matches('\n') == comm).then_some(pid)
        })
        .min()
}

/// Extract the `ID=` field from os-release content
#[must_use]
pub fn parse_os_distro(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.trim().strip_prefix("ID="))
        .map(|id| id.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|id| !id.is_empty())
}

/// Host facts shared by every operation of one program run
///
/// Owns the configuration and the memoized OS distribution.
#[derive(Debug, Default)]
pub struct HostEnvironment {
    config: HostConfig,
    os_distro: OnceLock<String>,
}

impl HostEnvironment {
    /// Create an environment for the given configuration
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            os_distro: OnceLock::new(),
        }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Host OS distribution ID, read once and cached
    ///
    /// # Errors
    /// Returns [`Error::OsRelease`] if the release file is unreadable or has no `ID=`
    pub fn os_distro(&self) -> Result<String> {
        if let Some(distro) = self.os_distro.get() {
            tracing::trace!(distro = %distro, "Cached OS distro");
            return Ok(distro.clone());
        }

        let path = &self.config.os_release_path;
        let content = fs::read_to_string(path).map_err(|e| Error::OsRelease {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let distro = parse_os_distro(&content).ok_or_else(|| Error::OsRelease {
            message: format!("failed to find ID field in {}", path.display()),
        })?;

        Ok(self.os_distro.get_or_init(|| distro).clone())
    }

    /// Drop the cached distribution so the next lookup rereads the file
    pub fn reset_cache(&mut self) {
        self.os_distro.take();
    }

    /// Process whose namespace host operations should use on this host
    ///
    /// Never fails: an undetectable distribution means no switch.
    #[must_use]
    pub fn default_process(&self) -> ProcessName {
        match self.os_distro() {
            Ok(distro) if distro == OS_DISTRO_TALOS_LINUX => ProcessName::kubelet(),
            Ok(_) => ProcessName::None,
            Err(e) => {
                tracing::trace!(error = %e, "Failed to get OS distro, falling back to default host process");
                ProcessName::None
            }
        }
    }

    /// Executor for the configured proc directory and namespace category
    #[must_use]
    pub fn executor(&self) -> NamespaceExecutor {
        NamespaceExecutor::new(&self.config)
    }

    /// Filesystem wrappers bound to `process`, or to the default process
    #[must_use]
    pub fn host_fs(&self, process: Option<ProcessName>) -> HostFs {
        let process = process.unwrap_or_else(|| self.default_process());
        HostFs::new(self.executor(), process)
    }

    /// File lock using the configured timeout
    #[must_use]
    pub fn file_lock(&self, path: impl Into<PathBuf>, timeout: Option<Duration>) -> FileLock {
        FileLock::new(path, timeout.unwrap_or(self.config.lock_timeout))
            .with_executor(self.executor(), ProcessName::None)
    }
}
