//! Core type definitions with strong typing and validation

use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Logical pointer to the process whose namespace an operation runs in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProcessName {
    /// No namespace switch; run in the caller's own namespace
    #[default]
    None,
    /// The init process (PID 1 under the proc directory)
    Init,
    /// A process found by its command name
    Named(String),
}

impl ProcessName {
    /// Kernel limit on `/proc/<pid>/comm` length, excluding the terminator
    pub const COMM_MAX_LENGTH: usize = 15;

    /// Supervisor used on hosts without standard mount namespace tooling
    #[must_use]
    pub fn kubelet() -> Self {
        Self::Named(crate::constants::PROCESS_KUBELET.to_string())
    }

    /// Create a named process with validation
    ///
    /// `none` and `init` are reserved for the other variants.
    ///
    /// # Errors
    /// Returns error if the name is empty, reserved or contains a path separator
    pub fn named(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty()
            || name.contains('/')
            || name.contains('\0')
            || matches!(name.as_str(), "none" | "init")
        {
            return Err(Error::InvalidConfig {
                message: format!("invalid process name {name:?}"),
            });
        }
        Ok(Self::Named(name))
    }

    /// Whether this name means "stay in the current namespace"
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Name as it appears in `/proc/<pid>/comm`
    #[must_use]
    pub fn comm(&self) -> Option<&str> {
        match self {
            Self::Named(name) => {
                let mut end = name.len().min(Self::COMM_MAX_LENGTH);
                while !name.is_char_boundary(end) {
                    end -= 1;
                }
                Some(&name[..end])
            }
            _ => None,
        }
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Init => write!(f, "init"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for ProcessName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "none" => Ok(Self::None),
            "init" => Ok(Self::Init),
            other => Self::named(other),
        }
    }
}

impl TryFrom<String> for ProcessName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ProcessName> for String {
    fn from(name: ProcessName) -> Self {
        name.to_string()
    }
}

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// The init process
    pub const INIT: Self = Self(1);

    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        #[allow(clippy::cast_possible_wrap)]
        Self(std::process::id() as i32)
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<i32>()
            .ok()
            .filter(|pid| *pid > 0)
            .map(Self)
            .ok_or_else(|| Error::InvalidConfig {
                message: format!("invalid process id {s:?}"),
            })
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        nix::unistd::Pid::from_raw(pid.0)
    }
}

/// Namespace category to enter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// Mount namespace (filesystem view)
    #[default]
    Mount,
    /// Network namespace
    Network,
    /// IPC namespace
    Ipc,
    /// UTS namespace (hostname)
    Uts,
}

impl NamespaceKind {
    /// Entry name under `/proc/<pid>/ns`
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Mount => "mnt",
            Self::Network => "net",
            Self::Ipc => "ipc",
            Self::Uts => "uts",
        }
    }

    /// Flag passed to setns(2)
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Mount => CloneFlags::CLONE_NEWNS,
            Self::Network => CloneFlags::CLONE_NEWNET,
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}

impl FromStr for NamespaceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mnt" | "mount" => Ok(Self::Mount),
            "net" | "network" => Ok(Self::Network),
            "ipc" => Ok(Self::Ipc),
            "uts" => Ok(Self::Uts),
            other => Err(Error::InvalidConfig {
                message: format!("unsupported namespace kind {other:?}"),
            }),
        }
    }
}
