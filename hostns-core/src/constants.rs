//! Host paths and defaults shared across crates

use std::time::Duration;

/// Where the host's `/proc` is mounted inside the container
pub const HOST_PROC_DIRECTORY: &str = "/host/proc";

/// Host release metadata
pub const OS_RELEASE_FILE_PATH: &str = "/etc/os-release";

/// Per-thread namespace handles of the calling process
pub const THREAD_SELF_NS_DIRECTORY: &str = "/proc/thread-self/ns";

/// Immutable distribution that lacks systemd and mount namespace tooling
pub const OS_DISTRO_TALOS_LINUX: &str = "talos";

/// Supervisor process whose namespace is used on minimal distributions
pub const PROCESS_KUBELET: &str = "kubelet";

/// Lock acquisition timeout used when none is configured
pub const FILE_LOCK_DEFAULT_TIMEOUT: Duration = Duration::from_secs(24);

/// Mode for files created by write operations
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Environment variable overriding [`HOST_PROC_DIRECTORY`]
pub const ENV_PROC_DIR: &str = "HOSTNS_PROC_DIR";

/// Environment variable overriding [`OS_RELEASE_FILE_PATH`]
pub const ENV_OS_RELEASE: &str = "HOSTNS_OS_RELEASE";

/// Environment variable overriding [`FILE_LOCK_DEFAULT_TIMEOUT`], in milliseconds
pub const ENV_LOCK_TIMEOUT_MS: &str = "HOSTNS_LOCK_TIMEOUT_MS";
