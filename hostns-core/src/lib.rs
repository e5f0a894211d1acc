//! hostns core - foundation types shared by the namespace executor, the
//! host filesystem wrappers and the file lock.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod resources;
pub mod types;

pub use config::HostConfig;
pub use error::{Error, Result, ResultExt};
pub use resources::{ByteSize, DiskStat};
pub use types::{NamespaceKind, ProcessId, ProcessName};
