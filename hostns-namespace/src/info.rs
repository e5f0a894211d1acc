//! Namespace identity of processes and threads

use std::fs;
use std::path::Path;

use hostns_core::constants::THREAD_SELF_NS_DIRECTORY;
use hostns_core::{Error, NamespaceKind, ProcessId, Result};

/// Namespace identifiers as shown by the `ns` symlinks, e.g. `mnt:[4026531841]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// Mount namespace ID
    pub mnt: Option<String>,
    /// Network namespace ID
    pub net: Option<String>,
    /// IPC namespace ID
    pub ipc: Option<String>,
    /// UTS namespace ID
    pub uts: Option<String>,
    /// PID namespace ID
    pub pid: Option<String>,
    /// User namespace ID
    pub user: Option<String>,
    /// CGroup namespace ID
    pub cgroup: Option<String>,
}

impl NamespaceInfo {
    /// Namespaces of `pid` under `proc_dir`
    ///
    /// # Errors
    /// Returns error if the process has no readable `ns` directory
    pub fn for_pid(proc_dir: &Path, pid: ProcessId) -> Result<Self> {
        Self::read(&proc_dir.join(pid.to_string()).join("ns"))
    }

    /// Namespaces of the calling thread
    ///
    /// # Errors
    /// Returns error if `/proc/thread-self/ns` cannot be read
    pub fn current_thread() -> Result<Self> {
        Self::read(Path::new(THREAD_SELF_NS_DIRECTORY))
    }

    fn read(ns_dir: &Path) -> Result<Self> {
        fs::read_dir(ns_dir).map_err(|source| Error::OpenNamespace {
            path: ns_dir.to_path_buf(),
            source,
        })?;

        let read_ns = |name: &str| -> Option<String> {
            fs::read_link(ns_dir.join(name))
                .map(|p| p.to_string_lossy().into_owned())
                .ok()
        };

        Ok(Self {
            mnt: read_ns("mnt"),
            net: read_ns("net"),
            ipc: read_ns("ipc"),
            uts: read_ns("uts"),
            pid: read_ns("pid"),
            user: read_ns("user"),
            cgroup: read_ns("cgroup"),
        })
    }

    /// Identifier of one of the categories the executor can enter
    #[must_use]
    pub fn get(&self, kind: NamespaceKind) -> Option<&str> {
        match kind {
            NamespaceKind::Mount => self.mnt.as_deref(),
            NamespaceKind::Network => self.net.as_deref(),
            NamespaceKind::Ipc => self.ipc.as_deref(),
            NamespaceKind::Uts => self.uts.as_deref(),
        }
    }

    /// Whether both sides are known to be in the same namespace of `kind`
    #[must_use]
    pub fn shares(&self, other: &Self, kind: NamespaceKind) -> bool {
        matches!((self.get(kind), other.get(kind)), (Some(a), Some(b)) if a == b)
    }
}

impl std::fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = [
            ("MNT", &self.mnt),
            ("NET", &self.net),
            ("IPC", &self.ipc),
            ("UTS", &self.uts),
            ("PID", &self.pid),
            ("USER", &self.user),
            ("CGROUP", &self.cgroup),
        ];
        for (label, value) in rows {
            if let Some(value) = value {
                writeln!(f, "  {:<7} {value}", format!("{label}:"))?;
            }
        }
        Ok(())
    }
}
