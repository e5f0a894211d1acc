//! Run work inside the namespaces of host processes
//!
//! - [`NamespaceExecutor`] - enter a process's namespace for one closure
//! - [`HostFs`] - filesystem operations routed through the executor
//! - [`FileLock`] - exclusive file lock acquired within a timeout
//! - [`HostEnvironment`] - host configuration and OS distribution detection

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod executor;
pub mod fs;
pub mod info;
pub mod lock;
pub mod resolver;
pub mod util;

pub use executor::NamespaceExecutor;
pub use fs::{HostFs, MIN_DESTRUCTIVE_DEPTH};
pub use info::NamespaceInfo;
pub use lock::{FileLock, LockState};
pub use resolver::{HostEnvironment, resolve_process};
pub use util::{DirEntryInfo, EntryKind};
