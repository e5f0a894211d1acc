//! Error types for hostns

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{NamespaceKind, ProcessId};

/// hostns error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// No process matching the requested name
    #[error("process {name} not found")]
    ProcessNotFound {
        /// Requested process name
        name: String,
    },

    /// The namespace handle of the target process could not be opened
    #[error("failed to open namespace handle {}", path.display())]
    OpenNamespace {
        /// Namespace handle path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// setns(2) into the target namespace failed
    #[error("failed to switch to {kind} namespace of process {pid}")]
    SwitchNamespace {
        /// Namespace category
        kind: NamespaceKind,
        /// Target process
        pid: ProcessId,
        /// Underlying error
        #[source]
        source: nix::Error,
    },

    /// setns(2) back into the original namespace failed
    ///
    /// The thread that ran the switch is left in an unknown namespace and is
    /// discarded.
    #[error("failed to restore original {kind} namespace")]
    RestoreNamespace {
        /// Namespace category
        kind: NamespaceKind,
        /// Underlying error
        #[source]
        source: nix::Error,
    },

    /// The closure run inside the namespace panicked
    #[error("namespace closure panicked: {message}")]
    ClosurePanicked {
        /// Panic payload, when it was a string
        message: String,
    },

    /// An operation failed; `message` names the operation and its target
    #[error("{message}")]
    Operation {
        /// Context message
        message: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Destructive operation requested on a top level path
    #[error("prohibited operation on top level path {}", path.display())]
    ProhibitedPath {
        /// Offending path
        path: PathBuf,
    },

    /// File lock acquisition exceeded its timeout
    #[error("timed out after {timeout:?} waiting for file to lock {}", path.display())]
    LockTimeout {
        /// Lock file path
        path: PathBuf,
        /// Configured timeout
        timeout: Duration,
    },

    /// Operation not valid in the current lifecycle state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Host release metadata missing or unparsable
    #[error("failed to get host OS distro: {message}")]
    OsRelease {
        /// Error message
        message: String,
    },

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl Error {
    /// Whether the error came from entering or leaving a namespace rather
    /// than from the operation that ran inside it
    #[must_use]
    pub fn is_namespace_transition(&self) -> bool {
        match self {
            Self::ProcessNotFound { .. }
            | Self::OpenNamespace { .. }
            | Self::SwitchNamespace { .. }
            | Self::RestoreNamespace { .. } => true,
            Self::Operation { source, .. } => source.is_namespace_transition(),
            _ => false,
        }
    }

    /// Whether the error is a lock acquisition timeout
    #[must_use]
    pub fn is_lock_timeout(&self) -> bool {
        match self {
            Self::LockTimeout { .. } => true,
            Self::Operation { source, .. } => source.is_lock_timeout(),
            _ => false,
        }
    }

    /// Innermost error of a context chain
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for hostns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Attach operation context to a failing result
pub trait ResultExt<T> {
    /// Wrap the error with a message built on demand
    ///
    /// # Errors
    /// Returns the original error wrapped in [`Error::Operation`]
    fn context<F, M>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> M,
        M: Into<String>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context<F, M>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> M,
        M: Into<String>,
    {
        self.map_err(|e| Error::Operation {
            message: message().into(),
            source: Box::new(e.into()),
        })
    }
}
