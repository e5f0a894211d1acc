//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hostns_core::ProcessName;
use hostns_core::constants::{ENV_LOCK_TIMEOUT_MS, ENV_OS_RELEASE, ENV_PROC_DIR};

#[derive(Parser)]
#[command(name = "hostns")]
#[command(about = "Run file operations inside the namespace of a host process", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Host proc directory
    #[arg(long, global = true, env = ENV_PROC_DIR)]
    pub proc_dir: Option<PathBuf>,

    /// Release file used to detect the host distribution
    #[arg(long, global = true, env = ENV_OS_RELEASE)]
    pub os_release: Option<PathBuf>,

    /// Process whose namespace to enter: none, init or a command name
    /// (default: detected from the host distribution)
    #[arg(short, long, global = true)]
    pub process: Option<ProcessName>,

    /// File lock timeout in milliseconds (0 selects the default)
    #[arg(long, global = true, env = ENV_LOCK_TIMEOUT_MS)]
    pub lock_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List a directory
    Ls {
        /// Directory to list
        path: PathBuf,
    },

    /// Print a file
    Cat {
        /// File to read
        path: PathBuf,
    },

    /// Replace a file's content
    Write {
        /// File to write
        path: PathBuf,

        /// New content (default: read from stdin)
        content: Option<String>,

        /// Flush the file to disk afterwards
        #[arg(long)]
        sync: bool,
    },

    /// Create a directory and its parents
    Mkdir {
        /// Directory to create
        path: PathBuf,

        /// Modification time in seconds since the epoch (default: now)
        #[arg(long)]
        mtime: Option<u64>,
    },

    /// Remove a file or directory tree
    Rm {
        /// Path to remove
        path: PathBuf,

        /// Only remove directories
        #[arg(short, long)]
        recursive_dir: bool,
    },

    /// Copy a directory tree
    Cp {
        /// Source path
        source: PathBuf,

        /// Destination path
        destination: PathBuf,

        /// Replace existing files
        #[arg(long)]
        overwrite: bool,
    },

    /// Show file metadata as JSON
    Stat {
        /// Path to inspect
        path: PathBuf,
    },

    /// Show filesystem usage as JSON
    Df {
        /// Any path on the filesystem
        path: PathBuf,
    },

    /// List empty files below a directory
    EmptyFiles {
        /// Directory to search
        path: PathBuf,
    },

    /// Hold an exclusive lock on a file
    Lock {
        /// Lock file
        path: PathBuf,

        /// How long to hold the lock in milliseconds
        #[arg(long, default_value = "1000")]
        hold_ms: u64,
    },

    /// Show the host distribution and the default process
    Distro,

    /// Show namespace information
    Namespaces {
        /// Process ID under the proc directory (default: this thread)
        #[arg(long)]
        pid: Option<hostns_core::ProcessId>,
    },
}
