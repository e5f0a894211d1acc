use std::time::Duration;

use anyhow::{Context, Result};
use hostns_core::HostConfig;
use hostns_namespace::{HostEnvironment, HostFs};

use crate::cli::{Cli, Commands};

pub mod distro;
pub mod fs;
pub mod lock;
pub mod namespaces;

/// Host configuration from global flags; unset flags keep the defaults
fn host_config(cli: &Cli) -> HostConfig {
    let mut config = HostConfig::new();
    if let Some(dir) = &cli.proc_dir {
        config = config.with_proc_dir(dir);
    }
    if let Some(path) = &cli.os_release {
        config = config.with_os_release_path(path);
    }
    if let Some(ms) = cli.lock_timeout_ms {
        config = config.with_lock_timeout(Duration::from_millis(ms));
    }
    config
}

/// Dispatch command to appropriate handler
pub async fn dispatch(cli: Cli) -> Result<()> {
    let env = HostEnvironment::new(host_config(&cli));
    let host = || -> HostFs {
        let host = env.host_fs(cli.process.clone());
        tracing::debug!(process = %host.process(), "Using host process namespace");
        host
    };

    match cli.command {
        Commands::Ls { ref path } => fs::list(&host(), path),
        Commands::Cat { ref path } => fs::cat(&host(), path),
        Commands::Write {
            ref path,
            ref content,
            sync,
        } => {
            let data = match content {
                Some(content) => content.clone().into_bytes(),
                None => {
                    let mut data = Vec::new();
                    std::io::Read::read_to_end(&mut std::io::stdin(), &mut data)
                        .context("Failed to read content from stdin")?;
                    data
                }
            };
            fs::write(&host(), path, &data, sync)
        }
        Commands::Mkdir { ref path, mtime } => fs::mkdir(&host(), path, mtime),
        Commands::Rm {
            ref path,
            recursive_dir,
        } => fs::remove(&host(), path, recursive_dir),
        Commands::Cp {
            ref source,
            ref destination,
            overwrite,
        } => fs::copy(&host(), source, destination, overwrite),
        Commands::Stat { ref path } => fs::stat(&host(), path),
        Commands::Df { ref path } => fs::disk_usage(&host(), path),
        Commands::EmptyFiles { ref path } => fs::empty_files(&host(), path),
        Commands::Lock { ref path, hold_ms } => {
            lock::execute(&env, path, Duration::from_millis(hold_ms)).await
        }
        Commands::Distro => distro::execute(&env),
        Commands::Namespaces { pid } => namespaces::execute(&env, pid),
    }
}
