//! Namespaces command implementation

use anyhow::{Context, Result};
use hostns_core::ProcessId;
use hostns_namespace::{HostEnvironment, NamespaceInfo};

pub fn execute(env: &HostEnvironment, pid: Option<ProcessId>) -> Result<()> {
    let info = match pid {
        Some(pid) => {
            println!("Namespaces of PID {pid}");
            NamespaceInfo::for_pid(&env.config().proc_dir, pid)
                .with_context(|| format!("Failed to get namespace information for PID {pid}"))?
        }
        None => {
            println!("Namespaces of the current thread");
            NamespaceInfo::current_thread().context("Failed to get namespace information")?
        }
    };

    print!("{info}");
    Ok(())
}
