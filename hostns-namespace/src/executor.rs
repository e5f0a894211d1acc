//! Run closures inside another process's namespace
//!
//! Namespace membership is per thread. Every switch happens on a dedicated,
//! scoped OS thread that is joined before [`NamespaceExecutor::run`] returns,
//! so the caller's threads (and the async runtime's workers) never change
//! namespace, and a thread whose restore failed is never reused.

use std::any::Any;
use std::fs::File;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use hostns_core::config::namespace_path;
use hostns_core::constants::{HOST_PROC_DIRECTORY, THREAD_SELF_NS_DIRECTORY};
use hostns_core::{Error, HostConfig, NamespaceKind, ProcessId, ProcessName, Result};
use nix::sched::{setns, unshare, CloneFlags};
use tracing::{debug, error, trace};

use crate::resolver::resolve_process;

/// Namespace-scoped closure executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceExecutor {
    proc_dir: PathBuf,
    kind: NamespaceKind,
}

impl Default for NamespaceExecutor {
    fn default() -> Self {
        Self {
            proc_dir: PathBuf::from(HOST_PROC_DIRECTORY),
            kind: NamespaceKind::Mount,
        }
    }
}

impl NamespaceExecutor {
    /// Create an executor from host configuration
    #[must_use]
    pub fn new(config: &HostConfig) -> Self {
        Self {
            proc_dir: config.proc_dir.clone(),
            kind: config.namespace,
        }
    }

    /// Look up processes under `proc_dir` instead of the host proc directory
    #[must_use]
    pub fn with_proc_dir(mut self, proc_dir: impl Into<PathBuf>) -> Self {
        self.proc_dir = proc_dir.into();
        self
    }

    /// Enter a different namespace category
    #[must_use]
    pub fn with_kind(mut self, kind: NamespaceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Proc directory used for resolution
    #[must_use]
    pub fn proc_dir(&self) -> &Path {
        &self.proc_dir
    }

    /// Namespace category entered
    #[must_use]
    pub const fn kind(&self) -> NamespaceKind {
        self.kind
    }

    /// Run `f` inside the namespace of `process` and return its result
    ///
    /// `ProcessName::None` runs `f` on the calling thread without switching.
    /// Otherwise the switch, the call and the restore happen on a dedicated
    /// thread; the original namespace is restored whether `f` succeeds,
    /// fails or panics.
    ///
    /// # Errors
    /// Resolution and transition failures ([`Error::is_namespace_transition`]),
    /// [`Error::ClosurePanicked`], or the error returned by `f` unchanged
    pub fn run<T, F>(&self, process: &ProcessName, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send,
        T: Send,
    {
        let Some(pid) = resolve_process(&self.proc_dir, process)? else {
            trace!("No namespace switch requested");
            return f();
        };

        let path = namespace_path(&self.proc_dir, pid, self.kind);
        let target = File::open(&path).map_err(|source| Error::OpenNamespace {
            path: path.clone(),
            source,
        })?;

        let kind = self.kind;
        debug!(
            process = %process,
            pid = pid.as_raw(),
            namespace = %kind,
            "Entering namespace"
        );

        std::thread::scope(|scope| {
            let handle = std::thread::Builder::new()
                .name(format!("ns-{kind}-{pid}"))
                .spawn_scoped(scope, || run_switched(kind, pid, &target, f))?;

            handle.join().map_err(|payload| Error::ClosurePanicked {
                message: panic_message(payload.as_ref()),
            })?
        })
    }
}

/// Switch, call, restore. Runs on a thread that exits right afterwards.
fn run_switched<T, F>(kind: NamespaceKind, pid: ProcessId, target: &File, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let switch_err = |source| Error::SwitchNamespace { kind, pid, source };

    // setns(CLONE_NEWNS) refuses threads that share fs attributes
    if kind == NamespaceKind::Mount {
        unshare(CloneFlags::CLONE_FS).map_err(switch_err)?;
    }

    let original_path = Path::new(THREAD_SELF_NS_DIRECTORY).join(kind.proc_name());
    let original = File::open(&original_path).map_err(|source| Error::OpenNamespace {
        path: original_path,
        source,
    })?;

    setns(target, kind.clone_flag()).map_err(switch_err)?;
    trace!(pid = pid.as_raw(), namespace = %kind, "Switched namespace");

    let outcome = panic::catch_unwind(AssertUnwindSafe(f));

    if let Err(source) = setns(&original, kind.clone_flag()) {
        error!(
            pid = pid.as_raw(),
            namespace = %kind,
            error = %source,
            "Failed to restore namespace, discarding thread"
        );
        return Err(Error::RestoreNamespace { kind, source });
    }
    trace!(namespace = %kind, "Restored namespace");

    outcome.unwrap_or_else(|payload| {
        Err(Error::ClosurePanicked {
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_none_runs_on_caller_thread() {
        let executor = NamespaceExecutor::default();
        let caller = std::thread::current().id();

        let ran_on = executor
            .run(&ProcessName::None, || Ok(std::thread::current().id()))
            .unwrap();

        assert_eq!(ran_on, caller);
    }

    #[test]
    fn test_none_passes_closure_error_through() {
        let executor = NamespaceExecutor::default();
        let err = executor
            .run(&ProcessName::None, || -> Result<()> {
                Err(Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound)))
            })
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_namespace_transition());
    }

    #[test]
    fn test_borrowed_state_in_closure() {
        let executor = NamespaceExecutor::default();
        let mut seen = Vec::new();
        executor
            .run(&ProcessName::None, || {
                seen.push(1);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn test_unknown_process_fails_before_closure() {
        let proc_dir = tempfile::tempdir().unwrap();
        let executor = NamespaceExecutor::default().with_proc_dir(proc_dir.path());
        let mut called = false;

        let err = executor
            .run(&ProcessName::kubelet(), || {
                called = true;
                Ok(())
            })
            .unwrap_err();

        assert!(!called);
        assert!(matches!(err, Error::ProcessNotFound { .. }));
        assert!(err.is_namespace_transition());
    }

    #[test]
    fn test_missing_namespace_handle() {
        let proc_dir = tempfile::tempdir().unwrap();
        let pid_dir = proc_dir.path().join("77");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("comm"), "kubelet\n").unwrap();

        let executor = NamespaceExecutor::default().with_proc_dir(proc_dir.path());
        let err = executor
            .run(&ProcessName::kubelet(), || Ok(()))
            .unwrap_err();

        match err {
            Error::OpenNamespace { path, .. } => {
                assert_eq!(path, pid_dir.join("ns").join("mnt"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_executor_from_config() {
        let config = HostConfig::new()
            .with_proc_dir("/proc")
            .with_namespace(NamespaceKind::Uts);
        let executor = NamespaceExecutor::new(&config);

        assert_eq!(executor.proc_dir(), Path::new("/proc"));
        assert_eq!(executor.kind(), NamespaceKind::Uts);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
